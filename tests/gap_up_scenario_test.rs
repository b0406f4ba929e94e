use std::sync::Arc;
use stock_anomaly::application::detection::AnomalyEnsemble;
use stock_anomaly::application::forecasting::TrendSeasonalForecaster;
use stock_anomaly::application::indicators::compute_indicators;
use stock_anomaly::application::pipeline::PipelineCoordinator;
use stock_anomaly::domain::analytics::{DetectionMethod, Direction};
use stock_anomaly::domain::config::AnalyticsConfig;
use stock_anomaly::domain::market::{InstrumentSeries, PricePoint};
use stock_anomaly::domain::ports::Forecaster;
use stock_anomaly::infrastructure::mock::{MockSeriesFetcher, RecordingNotifier, RecordingSink};

const DAY_MS: i64 = 86_400_000;
const START_MS: i64 = 1_704_153_600_000;
const BARS: usize = 100;
const SPIKE: usize = 60;

/// Closes alternate 100.00 / 100.25 with a 0.25 intraday range, so every true range
/// is exactly 0.375. One bar jumps to 110 and the next one reverts.
fn gap_up_series() -> InstrumentSeries {
    let points = (0..BARS)
        .map(|i| {
            let ts = START_MS + i as i64 * DAY_MS;
            let close = if i == SPIKE {
                110.0
            } else if i % 2 == 0 {
                100.0
            } else {
                100.25
            };
            if i == 0 {
                return PricePoint::new(ts, close, close + 0.1875, close - 0.1875, close, 1_000.0);
            }
            PricePoint::new(ts, close, close + 0.125, close - 0.125, close, 1_000.0)
        })
        .collect();
    InstrumentSeries::new("GAP", points).unwrap()
}

fn day(index: usize) -> i64 {
    START_MS + index as i64 * DAY_MS
}

#[test]
fn test_gap_up_fires_on_spike_day_only() {
    let config = AnalyticsConfig::default();
    let series = gap_up_series();
    let indicators = compute_indicators(&series, &config.indicators).unwrap();
    let forecast = TrendSeasonalForecaster::new()
        .fit(&series, &config.forecast)
        .unwrap();

    let events = AnomalyEnsemble::new(&config.detection).detect(
        &series,
        &indicators,
        Some(&forecast),
    );

    let spike_day = day(SPIKE);
    let on_spike: Vec<DetectionMethod> = events
        .iter()
        .filter(|e| e.timestamp() == spike_day)
        .map(|e| e.method())
        .collect();
    assert!(on_spike.contains(&DetectionMethod::ZScore), "events: {:?}", events);
    assert!(on_spike.contains(&DetectionMethod::BollingerBreakout));

    let zscore = events
        .iter()
        .find(|e| e.timestamp() == spike_day && e.method() == DetectionMethod::ZScore)
        .unwrap();
    assert_eq!(zscore.direction(), Direction::Above);
    assert!(zscore.score() > 3.0);

    // Level-based methods fire on the spike day alone
    for event in &events {
        if matches!(
            event.method(),
            DetectionMethod::ZScore
                | DetectionMethod::BollingerBreakout
                | DetectionMethod::ForecastDeviation
        ) {
            assert_eq!(event.timestamp(), spike_day, "unexpected {}", event);
        }
    }

    // Lagging windows may echo the shock, but never past the longest window
    let echo = config
        .indicators
        .rsi_window
        .max(config.indicators.atr_window);
    for event in &events {
        assert!(
            event.timestamp() >= spike_day && event.timestamp() <= day(SPIKE + echo),
            "event outside echo window: {}",
            event
        );
        if event.timestamp() > spike_day {
            assert!(
                matches!(
                    event.method(),
                    DetectionMethod::RsiExtreme | DetectionMethod::VolatilitySpike
                ),
                "unexpected echo event: {}",
                event
            );
        }
    }
}

#[test]
fn test_flat_series_never_fires_level_detectors() {
    let config = AnalyticsConfig::default();
    let series = InstrumentSeries::from_daily_closes("FLAT", START_MS, &[50.0; BARS]).unwrap();
    let indicators = compute_indicators(&series, &config.indicators).unwrap();

    let events = AnomalyEnsemble::new(&config.detection).detect(&series, &indicators, None);

    assert!(events.iter().all(|e| !matches!(
        e.method(),
        DetectionMethod::ZScore | DetectionMethod::BollingerBreakout
    )));
    assert!(
        indicators
            .rows()
            .iter()
            .filter_map(|r| r.rsi)
            .all(|rsi| (0.0..=100.0).contains(&rsi))
    );
}

#[tokio::test]
async fn test_gap_up_through_the_pipeline() {
    let notifier = RecordingNotifier::new();
    let coordinator = PipelineCoordinator::new(
        Arc::new(MockSeriesFetcher::new().with_series(gap_up_series())),
        Arc::new(TrendSeasonalForecaster::new()),
        Arc::new(RecordingSink::new()),
        Arc::new(notifier.clone()),
    );

    let result = coordinator
        .run_cycle(&["GAP".to_string()], &AnalyticsConfig::default())
        .await;

    let events = result.report("GAP").unwrap().events();
    assert!(
        events
            .iter()
            .any(|e| e.timestamp() == day(SPIKE) && e.method() == DetectionMethod::ZScore)
    );
    // Ordered by time, then severity
    assert!(events.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    assert_eq!(notifier.notifications().await.len(), 1);
}
