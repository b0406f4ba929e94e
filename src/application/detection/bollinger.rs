use super::{AnomalyDetector, DetectionContext};
use crate::application::indicators::rolling::is_negligible;
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Direction};

/// Flags closes strictly outside the Bollinger Bands. Collapsed bands never fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct BollingerBreakoutDetector;

impl AnomalyDetector for BollingerBreakoutDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::BollingerBreakout
    }

    fn detect(&self, ctx: &DetectionContext) -> Vec<AnomalyEvent> {
        ctx.aligned()
            .filter_map(|(point, row)| {
                let (upper, mid, lower) =
                    (row.bollinger_upper?, row.bollinger_mid?, row.bollinger_lower?);
                if is_negligible(upper - lower, mid) {
                    return None;
                }

                let (direction, bound, beyond) = if point.close > upper {
                    (Direction::Above, upper, point.close - upper)
                } else if point.close < lower {
                    (Direction::Below, lower, lower - point.close)
                } else {
                    return None;
                };
                let score = if mid.abs() > 0.0 { beyond / mid.abs() } else { beyond };

                Some(AnomalyEvent::new(
                    point.timestamp,
                    ctx.series.instrument(),
                    DetectionMethod::BollingerBreakout,
                    direction,
                    point.close,
                    bound,
                    score,
                    format!(
                        "Price broke {} {} Bollinger Band (${:.2})",
                        direction,
                        if direction == Direction::Above { "upper" } else { "lower" },
                        bound
                    ),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{IndicatorFrame, IndicatorRow};
    use crate::domain::market::InstrumentSeries;

    fn row(timestamp: i64, upper: f64, mid: f64, lower: f64) -> IndicatorRow {
        IndicatorRow {
            timestamp,
            bollinger_upper: Some(upper),
            bollinger_mid: Some(mid),
            bollinger_lower: Some(lower),
            ..Default::default()
        }
    }

    #[test]
    fn test_breakouts_both_sides() {
        let series =
            InstrumentSeries::from_daily_closes("BB", 0, &[100.0, 112.0, 88.0, 110.0]).unwrap();
        let ts = series.timestamps();
        let frame = IndicatorFrame::new(vec![
            row(ts[0], 110.0, 100.0, 90.0),
            row(ts[1], 110.0, 100.0, 90.0),
            row(ts[2], 110.0, 100.0, 90.0),
            row(ts[3], 110.0, 100.0, 90.0),
        ]);
        let ctx = DetectionContext::new(&series, &frame, None);

        let events = BollingerBreakoutDetector.detect(&ctx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].direction(), Direction::Above);
        assert!((events[0].score() - 0.02).abs() < 1e-12);
        assert_eq!(events[1].direction(), Direction::Below);
        assert_eq!(events[1].reference_value(), 90.0);
    }

    #[test]
    fn test_collapsed_band_never_fires() {
        let series = InstrumentSeries::from_daily_closes("BB", 0, &[100.0, 120.0]).unwrap();
        let ts = series.timestamps();
        let frame = IndicatorFrame::new(vec![
            row(ts[0], 100.0, 100.0, 100.0),
            row(ts[1], 100.0, 100.0, 100.0),
        ]);
        let ctx = DetectionContext::new(&series, &frame, None);
        assert!(BollingerBreakoutDetector.detect(&ctx).is_empty());
    }

    #[test]
    fn test_absent_bands_are_skipped() {
        let series = InstrumentSeries::from_daily_closes("BB", 0, &[100.0, 500.0]).unwrap();
        let frame = IndicatorFrame::new(
            series
                .timestamps()
                .into_iter()
                .map(|timestamp| IndicatorRow {
                    timestamp,
                    ..Default::default()
                })
                .collect(),
        );
        let ctx = DetectionContext::new(&series, &frame, None);
        assert!(BollingerBreakoutDetector.detect(&ctx).is_empty());
    }
}
