use crate::domain::analytics::{ForecastFrame, ForecastKind, ForecastPoint};
use crate::domain::config::ForecastSettings;
use crate::domain::errors::ForecastError;
use crate::domain::market::InstrumentSeries;
use crate::domain::ports::Forecaster;
use statrs::distribution::{ContinuousCDF, Normal};

pub const MODEL_NAME: &str = "trend_seasonal";

/// Linear trend plus additive seasonal profile, with prediction-interval bands.
///
/// Time is measured in units of the median sampling step so that gaps (weekends,
/// holidays) keep their true distance. Fitting is deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendSeasonalForecaster;

impl TrendSeasonalForecaster {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted model parameters, kept separate from the frame for testing
#[derive(Debug, Clone, PartialEq)]
struct FittedModel {
    intercept: f64,
    slope: f64,
    seasonal: Vec<f64>,
    sigma: f64,
    t_mean: f64,
    sxx: f64,
    n: usize,
}

impl FittedModel {
    fn phase(&self, t: f64) -> Option<usize> {
        if self.seasonal.is_empty() {
            return None;
        }
        let period = self.seasonal.len() as i64;
        Some((t.round() as i64).rem_euclid(period) as usize)
    }

    fn predict(&self, t: f64) -> f64 {
        let season = self.phase(t).map(|p| self.seasonal[p]).unwrap_or(0.0);
        self.intercept + self.slope * t + season
    }

    fn half_width(&self, t: f64, z: f64) -> f64 {
        let leverage = 1.0 / self.n as f64 + (t - self.t_mean).powi(2) / self.sxx;
        z * self.sigma * (1.0 + leverage).sqrt()
    }
}

fn fit_model(t: &[f64], y: &[f64], season_length: usize) -> Result<FittedModel, ForecastError> {
    let n = y.len();
    let n_f = n as f64;
    let t_mean = t.iter().sum::<f64>() / n_f;
    let y_mean = y.iter().sum::<f64>() / n_f;

    let sxx: f64 = t.iter().map(|ti| (ti - t_mean).powi(2)).sum();
    if sxx <= 0.0 {
        return Err(ForecastError::Degenerate {
            reason: "time axis has no spread".to_string(),
        });
    }
    let sxy: f64 = t
        .iter()
        .zip(y)
        .map(|(ti, yi)| (ti - t_mean) * (yi - y_mean))
        .sum();
    let slope = sxy / sxx;
    let intercept = y_mean - slope * t_mean;

    let mut model = FittedModel {
        intercept,
        slope,
        seasonal: Vec::new(),
        sigma: 0.0,
        t_mean,
        sxx,
        n,
    };

    // Seasonal profile only with at least two full seasons of data
    let seasonal = season_length >= 2 && n >= 2 * season_length;
    if seasonal {
        let mut sums = vec![0.0; season_length];
        let mut counts = vec![0usize; season_length];
        let period = season_length as i64;
        for (ti, yi) in t.iter().zip(y) {
            let phase = (ti.round() as i64).rem_euclid(period) as usize;
            sums[phase] += yi - (intercept + slope * ti);
            counts[phase] += 1;
        }
        let mut profile: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        let center = profile.iter().sum::<f64>() / season_length as f64;
        profile.iter_mut().for_each(|p| *p -= center);
        model.seasonal = profile;
    }

    let parameters = 2 + if seasonal { season_length - 1 } else { 0 };
    let dof = n.saturating_sub(parameters);
    if dof == 0 {
        return Err(ForecastError::Degenerate {
            reason: format!("{} points cannot fit {} parameters", n, parameters),
        });
    }

    let ssr: f64 = t
        .iter()
        .zip(y)
        .map(|(&ti, yi)| (yi - model.predict(ti)).powi(2))
        .sum();
    model.sigma = (ssr / dof as f64).sqrt();
    Ok(model)
}

impl Forecaster for TrendSeasonalForecaster {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn fit(
        &self,
        series: &InstrumentSeries,
        settings: &ForecastSettings,
    ) -> Result<ForecastFrame, ForecastError> {
        let required = settings.min_history().max(3);
        let step = match series.median_step_ms() {
            Some(step) if series.len() >= required => step,
            _ => {
                return Err(ForecastError::InsufficientHistory {
                    required,
                    available: series.len(),
                });
            }
        };

        let origin = series.points()[0].timestamp;
        let t: Vec<f64> = series
            .timestamps()
            .iter()
            .map(|ts| (ts - origin) as f64 / step as f64)
            .collect();
        let y = series.closes();

        let model = fit_model(&t, &y, settings.season_length)?;

        let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Degenerate {
            reason: e.to_string(),
        })?;
        let z = normal.inverse_cdf((1.0 + settings.confidence) / 2.0);

        let band = |timestamp: i64, ti: f64, kind: ForecastKind| {
            let yhat = model.predict(ti);
            let half = model.half_width(ti, z);
            ForecastPoint {
                timestamp,
                yhat,
                yhat_lower: yhat - half,
                yhat_upper: yhat + half,
                kind,
            }
        };

        let mut points: Vec<ForecastPoint> = series
            .timestamps()
            .iter()
            .zip(&t)
            .map(|(&ts, &ti)| band(ts, ti, ForecastKind::Fitted))
            .collect();

        let last_ts = series.points()[series.len() - 1].timestamp;
        let last_t = t[t.len() - 1];
        points.extend((1..=settings.horizon).map(|k| {
            band(
                last_ts + step * k as i64,
                last_t + k as f64,
                ForecastKind::Projected,
            )
        }));

        if let Some(bad) = points
            .iter()
            .find(|p| !(p.yhat.is_finite() && p.yhat_lower.is_finite() && p.yhat_upper.is_finite()))
        {
            return Err(ForecastError::Degenerate {
                reason: format!("non-finite forecast at timestamp {}", bad.timestamp),
            });
        }

        Ok(ForecastFrame::new(
            series.instrument(),
            MODEL_NAME,
            settings.confidence,
            points,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PricePoint;

    const DAY: i64 = 86_400_000;

    fn settings() -> ForecastSettings {
        ForecastSettings::default()
    }

    fn trending(n: usize) -> InstrumentSeries {
        let closes: Vec<f64> = (0..n)
            .map(|i| 50.0 + 0.5 * i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect();
        InstrumentSeries::from_daily_closes("TREND", 0, &closes).unwrap()
    }

    #[test]
    fn test_insufficient_history() {
        let series = trending(59);
        let err = TrendSeasonalForecaster::new()
            .fit(&series, &settings())
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientHistory {
                required: 60,
                available: 59
            }
        );
    }

    #[test]
    fn test_frame_covers_history_and_horizon() {
        let series = trending(80);
        let frame = TrendSeasonalForecaster::new()
            .fit(&series, &settings())
            .unwrap();

        assert_eq!(frame.fitted().count(), 80);
        assert_eq!(frame.projected().count(), 30);
        assert_eq!(frame.model(), MODEL_NAME);
        for ts in series.timestamps() {
            assert!(frame.at(ts).is_some());
        }
        let first_projected = frame.projected().next().unwrap();
        assert_eq!(first_projected.timestamp, 80 * DAY);
    }

    #[test]
    fn test_bands_contain_point_forecast_and_widen_forward() {
        let frame = TrendSeasonalForecaster::new()
            .fit(&trending(80), &settings())
            .unwrap();
        for p in frame.points() {
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
        }
        let projected: Vec<&ForecastPoint> = frame.projected().collect();
        let first = projected[0].yhat_upper - projected[0].yhat_lower;
        let last = projected[29].yhat_upper - projected[29].yhat_lower;
        assert!(last > first);
    }

    #[test]
    fn test_trend_is_recovered() {
        let frame = TrendSeasonalForecaster::new()
            .fit(&trending(100), &settings())
            .unwrap();
        let p = frame.at(100 * DAY).unwrap();
        // 50 + 0.5 * 100 with alternating noise averaging out
        assert!((p.yhat - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_deterministic() {
        let series = trending(90);
        let forecaster = TrendSeasonalForecaster::new();
        let a = forecaster.fit(&series, &settings()).unwrap();
        let b = forecaster.fit(&series, &settings()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_flat_series_has_zero_width_band() {
        let series = InstrumentSeries::from_daily_closes("FLAT", 0, &[100.0; 70]).unwrap();
        let frame = TrendSeasonalForecaster::new()
            .fit(&series, &settings())
            .unwrap();
        for p in frame.fitted() {
            assert_eq!(p.yhat, 100.0);
            assert!(p.contains(100.0));
        }
    }

    #[test]
    fn test_gaps_keep_real_spacing() {
        // Weekday bars: Monday..Friday, skipping weekends
        let points: Vec<PricePoint> = (0..84)
            .filter(|d| d % 7 < 5)
            .map(|d| PricePoint::from_close(d * DAY, 10.0 + d as f64))
            .collect();
        let series = InstrumentSeries::new("GAPS", points).unwrap();
        let settings = ForecastSettings {
            horizon: 10,
            season_length: 0,
            ..Default::default()
        };
        let frame = TrendSeasonalForecaster::new().fit(&series, &settings).unwrap();

        // Exact linear relation in calendar time survives the gaps
        for (p, point) in frame.fitted().zip(series.points()) {
            assert!((p.yhat - point.close).abs() < 1e-6);
        }
    }
}
