//! Anomaly Ensemble
//!
//! Runs independent detectors over the same timestamp axis and merges their events
//! into one ordered stream. Interpreting the stream (confirmation, composite scores)
//! lives in [`policy`].

pub mod bollinger;
pub mod forecast_deviation;
pub mod policy;
pub mod rsi_extreme;
pub mod volatility;
pub mod zscore;

use crate::domain::analytics::{
    AnomalyEvent, DetectionMethod, ForecastFrame, IndicatorFrame, IndicatorRow,
};
use crate::domain::config::DetectionSettings;
use crate::domain::market::{InstrumentSeries, PricePoint};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

pub use bollinger::BollingerBreakoutDetector;
pub use forecast_deviation::ForecastDeviationDetector;
pub use policy::{CompositeScorer, ConfirmationPolicy};
pub use rsi_extreme::RsiExtremeDetector;
pub use volatility::VolatilitySpikeDetector;
pub use zscore::ZScoreDetector;

/// Inputs shared by every detector for one instrument
pub struct DetectionContext<'a> {
    pub series: &'a InstrumentSeries,
    pub indicators: &'a IndicatorFrame,
    pub forecast: Option<&'a ForecastFrame>,
}

impl<'a> DetectionContext<'a> {
    pub fn new(
        series: &'a InstrumentSeries,
        indicators: &'a IndicatorFrame,
        forecast: Option<&'a ForecastFrame>,
    ) -> Self {
        Self {
            series,
            indicators,
            forecast,
        }
    }

    /// Points paired with their indicator row. Rows that do not line up are skipped.
    pub fn aligned(&self) -> impl Iterator<Item = (&'a PricePoint, &'a IndicatorRow)> + 'a {
        let indicators = self.indicators;
        self.series
            .points()
            .iter()
            .enumerate()
            .filter_map(move |(i, p)| {
                indicators
                    .get(i)
                    .filter(|row| row.timestamp == p.timestamp)
                    .map(|row| (p, row))
            })
    }
}

/// One detection method. Emits at most one event per timestamp.
pub trait AnomalyDetector: Send + Sync {
    fn method(&self) -> DetectionMethod;
    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent>;
}

#[derive(Clone)]
pub struct AnomalyEnsemble {
    detectors: Vec<Arc<dyn AnomalyDetector>>,
}

impl AnomalyEnsemble {
    /// Build the detectors enabled in `settings`, in fixed method order
    pub fn new(settings: &DetectionSettings) -> Self {
        let detectors = DetectionMethod::ALL
            .iter()
            .filter(|m| settings.is_enabled(**m))
            .map(|m| -> Arc<dyn AnomalyDetector> {
                match m {
                    DetectionMethod::ZScore => Arc::new(ZScoreDetector::new(
                        settings.zscore_window,
                        settings.zscore_threshold,
                    )),
                    DetectionMethod::ForecastDeviation => Arc::new(ForecastDeviationDetector),
                    DetectionMethod::VolatilitySpike => Arc::new(VolatilitySpikeDetector::new(
                        settings.volatility_percentile,
                        settings.volatility_min_samples,
                    )),
                    DetectionMethod::BollingerBreakout => Arc::new(BollingerBreakoutDetector),
                    DetectionMethod::RsiExtreme => Arc::new(RsiExtremeDetector::new(
                        settings.rsi_overbought,
                        settings.rsi_oversold,
                    )),
                }
            })
            .collect();
        Self { detectors }
    }

    pub fn with_detectors(detectors: Vec<Arc<dyn AnomalyDetector>>) -> Self {
        Self { detectors }
    }

    pub fn methods(&self) -> Vec<DetectionMethod> {
        self.detectors.iter().map(|d| d.method()).collect()
    }

    /// Run every detector and return the events ordered by timestamp, then severity
    /// (high first), then method, then score (high first).
    ///
    /// A missing forecast skips the forecast-based method only.
    pub fn detect(
        &self,
        series: &InstrumentSeries,
        indicators: &IndicatorFrame,
        forecast: Option<&ForecastFrame>,
    ) -> Vec<AnomalyEvent> {
        let ctx = DetectionContext::new(series, indicators, forecast);
        let mut events: Vec<AnomalyEvent> = self
            .detectors
            .iter()
            .flat_map(|d| d.detect(&ctx))
            .collect();
        sort_events(&mut events);

        if !events.is_empty() {
            debug!(
                "Ensemble: {} events for {}",
                events.len(),
                series.instrument()
            );
        }
        events
    }
}

pub fn sort_events(events: &mut [AnomalyEvent]) {
    events.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| b.severity().cmp(&a.severity()))
            .then_with(|| a.method().cmp(&b.method()))
            .then_with(|| {
                b.score()
                    .partial_cmp(&a.score())
                    .unwrap_or(Ordering::Equal)
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indicators::compute_indicators;
    use crate::domain::analytics::{Direction, Severity};
    use crate::domain::config::IndicatorSettings;

    fn event(ts: i64, method: DetectionMethod, score: f64) -> AnomalyEvent {
        AnomalyEvent::new(ts, "T", method, Direction::Above, 0.0, 0.0, score, "")
    }

    #[test]
    fn test_sort_order() {
        let mut events = vec![
            event(2, DetectionMethod::ZScore, 1.0),
            event(1, DetectionMethod::RsiExtreme, 5.0),
            event(1, DetectionMethod::BollingerBreakout, 0.1),
            event(1, DetectionMethod::ForecastDeviation, 0.2),
            event(1, DetectionMethod::ZScore, 0.3),
            event(1, DetectionMethod::VolatilitySpike, 0.9),
        ];
        sort_events(&mut events);

        let order: Vec<(i64, DetectionMethod)> =
            events.iter().map(|e| (e.timestamp(), e.method())).collect();
        assert_eq!(
            order,
            vec![
                (1, DetectionMethod::ZScore),
                (1, DetectionMethod::ForecastDeviation),
                (1, DetectionMethod::VolatilitySpike),
                (1, DetectionMethod::BollingerBreakout),
                (1, DetectionMethod::RsiExtreme),
                (2, DetectionMethod::ZScore),
            ]
        );
        assert!(events.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()
            || w[0].severity() >= w[1].severity()));
    }

    #[test]
    fn test_methods_subset() {
        let settings = DetectionSettings {
            methods: vec![DetectionMethod::RsiExtreme, DetectionMethod::ZScore],
            ..Default::default()
        };
        let ensemble = AnomalyEnsemble::new(&settings);
        assert_eq!(
            ensemble.methods(),
            vec![DetectionMethod::ZScore, DetectionMethod::RsiExtreme]
        );
    }

    #[test]
    fn test_events_reference_series_timestamps() {
        let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 3) as f64 * 0.5).collect();
        closes[45] = 130.0;
        let series = InstrumentSeries::from_daily_closes("SPIKE", 0, &closes).unwrap();
        let frame = compute_indicators(&series, &IndicatorSettings::default()).unwrap();

        let events =
            AnomalyEnsemble::new(&DetectionSettings::default()).detect(&series, &frame, None);

        assert!(!events.is_empty());
        for e in &events {
            assert!(series.contains_timestamp(e.timestamp()));
            assert_ne!(e.method(), DetectionMethod::ForecastDeviation);
            assert_eq!(e.severity(), e.method().severity());
        }
        assert!(events
            .iter()
            .any(|e| e.method() == DetectionMethod::ZScore && e.severity() == Severity::High));
    }

    #[test]
    fn test_one_event_per_method_and_timestamp() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + if i % 9 == 0 { 12.0 } else { (i % 4) as f64 })
            .collect();
        let series = InstrumentSeries::from_daily_closes("MANY", 0, &closes).unwrap();
        let frame = compute_indicators(&series, &IndicatorSettings::default()).unwrap();
        let events =
            AnomalyEnsemble::new(&DetectionSettings::default()).detect(&series, &frame, None);

        let mut keys: Vec<(i64, DetectionMethod)> =
            events.iter().map(|e| (e.timestamp(), e.method())).collect();
        let total = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }
}
