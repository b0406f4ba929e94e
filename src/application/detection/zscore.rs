use super::{AnomalyDetector, DetectionContext};
use crate::application::indicators::rolling::{is_negligible, rolling_mean_std};
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Direction};

/// Z-Score Detector
///
/// Flags closes more than `threshold` sample standard deviations away from the rolling
/// mean over `window` closes (current close included).
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    pub window: usize,
    pub threshold: f64,
}

impl ZScoreDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self { window, threshold }
    }

    /// Z-score of `price` when it strictly exceeds the threshold.
    ///
    /// Zero dispersion is "no signal", never a division.
    pub fn evaluate(&self, price: f64, mean: f64, std: f64) -> Option<f64> {
        if is_negligible(std, mean) {
            return None;
        }
        let z = (price - mean) / std;
        (z.abs() > self.threshold).then_some(z)
    }
}

impl AnomalyDetector for ZScoreDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::ZScore
    }

    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent> {
        let closes = ctx.series.closes();
        let stats = rolling_mean_std(&closes, self.window);

        ctx.series
            .points()
            .iter()
            .zip(stats)
            .filter_map(|(point, stats)| {
                let (mean, std) = stats?;
                let z = self.evaluate(point.close, mean, std)?;
                let direction = if z > 0.0 {
                    Direction::Above
                } else {
                    Direction::Below
                };
                Some(AnomalyEvent::new(
                    point.timestamp,
                    ctx.series.instrument(),
                    DetectionMethod::ZScore,
                    direction,
                    point.close,
                    mean,
                    z.abs() - self.threshold,
                    format!("Price is {:.1}σ {} the rolling mean", z.abs(), direction),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::IndicatorFrame;
    use crate::domain::market::InstrumentSeries;

    #[test]
    fn test_exact_threshold_does_not_fire() {
        let detector = ZScoreDetector::new(20, 3.0);
        assert_eq!(detector.evaluate(106.0, 100.0, 2.0), None);
        assert_eq!(detector.evaluate(94.0, 100.0, 2.0), None);
        assert_eq!(detector.evaluate(106.5, 100.0, 2.0), Some(3.25));
        assert_eq!(detector.evaluate(93.5, 100.0, 2.0), Some(-3.25));
    }

    #[test]
    fn test_zero_dispersion_is_no_signal() {
        let detector = ZScoreDetector::new(20, 3.0);
        assert_eq!(detector.evaluate(100.0, 100.0, 0.0), None);
        assert_eq!(detector.evaluate(150.0, 100.0, 1e-15), None);
    }

    #[test]
    fn test_flat_series_never_fires() {
        let series = InstrumentSeries::from_daily_closes("FLAT", 0, &[42.0; 50]).unwrap();
        let frame = IndicatorFrame::default();
        let ctx = DetectionContext::new(&series, &frame, None);
        assert!(ZScoreDetector::new(20, 3.0).detect(&ctx).is_empty());
    }

    #[test]
    fn test_drop_fires_below() {
        let mut closes: Vec<f64> = (0..30).map(|i| 50.0 + (i % 2) as f64 * 0.2).collect();
        closes[25] = 40.0;
        let series = InstrumentSeries::from_daily_closes("DROP", 0, &closes).unwrap();
        let frame = IndicatorFrame::default();
        let ctx = DetectionContext::new(&series, &frame, None);

        let events = ZScoreDetector::new(20, 3.0).detect(&ctx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp(), series.points()[25].timestamp);
        assert_eq!(events[0].direction(), Direction::Below);
        assert!(events[0].score() > 0.0);
    }
}
