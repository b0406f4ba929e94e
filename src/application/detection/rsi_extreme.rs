use super::{AnomalyDetector, DetectionContext};
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Direction};

/// Flags overbought (RSI above `overbought`) and oversold (RSI below `oversold`) readings
#[derive(Debug, Clone)]
pub struct RsiExtremeDetector {
    pub overbought: f64,
    pub oversold: f64,
}

impl RsiExtremeDetector {
    pub fn new(overbought: f64, oversold: f64) -> Self {
        Self {
            overbought,
            oversold,
        }
    }
}

impl AnomalyDetector for RsiExtremeDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::RsiExtreme
    }

    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent> {
        ctx.aligned()
            .filter_map(|(point, row)| {
                let rsi = row.rsi?;
                let (direction, threshold, score, label) = if rsi > self.overbought {
                    (
                        Direction::Above,
                        self.overbought,
                        (rsi - self.overbought) / (100.0 - self.overbought),
                        "overbought",
                    )
                } else if rsi < self.oversold {
                    (
                        Direction::Below,
                        self.oversold,
                        (self.oversold - rsi) / self.oversold,
                        "oversold",
                    )
                } else {
                    return None;
                };

                Some(AnomalyEvent::new(
                    point.timestamp,
                    ctx.series.instrument(),
                    DetectionMethod::RsiExtreme,
                    direction,
                    rsi,
                    threshold,
                    score,
                    format!("RSI {} at {:.1} (threshold: {})", label, rsi, threshold),
                ))
            })
            .collect()
    }
}
