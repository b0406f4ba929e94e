use super::{AnomalyDetector, DetectionContext};
use crate::application::indicators::rolling::is_negligible;
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Direction};
use statrs::statistics::{Data, OrderStatistics};

/// Volatility Spike Detector
///
/// Compares each ATR value with a percentile of every ATR value observed up to and
/// including that point. Needs `min_samples` observations, a non-degenerate
/// distribution and a positive ATR before it can fire. An ATR equal to the
/// percentile up to floating-point noise does not fire.
#[derive(Debug, Clone)]
pub struct VolatilitySpikeDetector {
    pub percentile: usize,
    pub min_samples: usize,
}

impl VolatilitySpikeDetector {
    pub fn new(percentile: usize, min_samples: usize) -> Self {
        Self {
            percentile,
            min_samples,
        }
    }
}

impl AnomalyDetector for VolatilitySpikeDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::VolatilitySpike
    }

    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent> {
        let mut observed: Vec<f64> = Vec::new();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut events = Vec::new();

        for (point, row) in ctx.aligned() {
            let Some(atr) = row.atr else {
                continue;
            };
            observed.push(atr);
            min = min.min(atr);
            max = max.max(atr);

            if observed.len() < self.min_samples || atr <= 0.0 {
                continue;
            }
            if is_negligible(max - min, max) {
                continue;
            }

            // Within rounding noise of the percentile is a plateau, not a spike
            let threshold = Data::new(observed.clone()).percentile(self.percentile);
            if atr < threshold || (threshold > 0.0 && is_negligible(atr - threshold, threshold)) {
                continue;
            }

            let score = if is_negligible(threshold, atr) {
                1.0
            } else {
                (atr - threshold) / threshold
            };
            events.push(AnomalyEvent::new(
                point.timestamp,
                ctx.series.instrument(),
                DetectionMethod::VolatilitySpike,
                Direction::Above,
                atr,
                threshold,
                score,
                format!(
                    "ATR ({:.2}) reached the {}th percentile ({:.2})",
                    atr, self.percentile, threshold
                ),
            ));
        }
        events
    }
}
