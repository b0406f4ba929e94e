use super::{AnomalyDetector, DetectionContext};
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Direction};

/// Flags closes strictly outside the forecast band at the same timestamp.
///
/// Reads only `{yhat, yhat_lower, yhat_upper}` so any forecaster fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastDeviationDetector;

impl AnomalyDetector for ForecastDeviationDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::ForecastDeviation
    }

    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent> {
        let Some(forecast) = ctx.forecast else {
            return Vec::new();
        };

        ctx.series
            .points()
            .iter()
            .filter_map(|point| {
                let band = forecast.at(point.timestamp)?;
                let (direction, beyond) = if point.close > band.yhat_upper {
                    (Direction::Above, point.close - band.yhat_upper)
                } else if point.close < band.yhat_lower {
                    (Direction::Below, band.yhat_lower - point.close)
                } else {
                    return None;
                };

                let scale = band.yhat.abs();
                let score = if scale > 0.0 { beyond / scale } else { beyond };
                let deviation_pct = if scale > 0.0 {
                    (point.close - band.yhat).abs() / scale * 100.0
                } else {
                    0.0
                };

                Some(AnomalyEvent::new(
                    point.timestamp,
                    ctx.series.instrument(),
                    DetectionMethod::ForecastDeviation,
                    direction,
                    point.close,
                    band.yhat,
                    score,
                    format!(
                        "Price {:.1}% {} forecast (band {:.2} - {:.2})",
                        deviation_pct, direction, band.yhat_lower, band.yhat_upper
                    ),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{ForecastFrame, ForecastKind, ForecastPoint, IndicatorFrame};
    use crate::domain::market::InstrumentSeries;

    fn band(timestamp: i64) -> ForecastPoint {
        ForecastPoint {
            timestamp,
            yhat: 100.0,
            yhat_lower: 95.0,
            yhat_upper: 105.0,
            kind: ForecastKind::Fitted,
        }
    }

    #[test]
    fn test_fires_strictly_outside_band() {
        let series =
            InstrumentSeries::from_daily_closes("F", 0, &[100.0, 105.0, 110.0, 90.0]).unwrap();
        let forecast = ForecastFrame::new(
            "F",
            "test",
            0.95,
            series.timestamps().into_iter().map(band).collect(),
        );
        let frame = IndicatorFrame::default();
        let ctx = DetectionContext::new(&series, &frame, Some(&forecast));

        let events = ForecastDeviationDetector.detect(&ctx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].direction(), Direction::Above);
        assert!((events[0].score() - 0.05).abs() < 1e-12);
        assert_eq!(events[1].direction(), Direction::Below);
        assert_eq!(events[1].reference_value(), 100.0);
    }

    #[test]
    fn test_missing_forecast_skips_method() {
        let series = InstrumentSeries::from_daily_closes("F", 0, &[1.0, 500.0]).unwrap();
        let frame = IndicatorFrame::default();
        let ctx = DetectionContext::new(&series, &frame, None);
        assert!(ForecastDeviationDetector.detect(&ctx).is_empty());
    }

    #[test]
    fn test_timestamps_without_band_are_skipped() {
        let series = InstrumentSeries::from_daily_closes("F", 0, &[200.0, 200.0]).unwrap();
        let forecast = ForecastFrame::new("F", "test", 0.95, vec![band(series.timestamps()[1])]);
        let frame = IndicatorFrame::default();
        let ctx = DetectionContext::new(&series, &frame, Some(&forecast));

        let events = ForecastDeviationDetector.detect(&ctx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp(), series.timestamps()[1]);
    }
}
