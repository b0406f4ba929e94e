use std::sync::Arc;
use stock_anomaly::application::forecasting::TrendSeasonalForecaster;
use stock_anomaly::application::pipeline::PipelineCoordinator;
use stock_anomaly::domain::config::AnalyticsConfig;
use stock_anomaly::domain::market::InstrumentSeries;
use stock_anomaly::infrastructure::mock::{MockSeriesFetcher, RecordingNotifier};
use stock_anomaly::infrastructure::persistence::{Database, SqliteAnalyticsSink};

fn spike_series() -> InstrumentSeries {
    let closes: Vec<f64> = (0..100)
        .map(|i| match i {
            70 => 90.0,
            i if i % 2 == 0 => 100.0,
            _ => 100.25,
        })
        .collect();
    InstrumentSeries::from_daily_closes("DROP", 1_704_153_600_000, &closes).unwrap()
}

#[tokio::test]
async fn test_cycles_write_to_sqlite_without_duplicates() {
    let dir = std::env::temp_dir().join(format!("stock-anomaly-db-{}", std::process::id()));
    let db_url = format!("sqlite://{}/nested/analytics.db", dir.display());

    let db = Database::new(&db_url).await.unwrap();
    let coordinator = PipelineCoordinator::new(
        Arc::new(MockSeriesFetcher::new().with_series(spike_series())),
        Arc::new(TrendSeasonalForecaster::new()),
        Arc::new(SqliteAnalyticsSink::new(db.pool.clone())),
        Arc::new(RecordingNotifier::new()),
    );

    let instruments = vec!["DROP".to_string(), "AAPL".to_string()];
    let config = AnalyticsConfig::default();
    let first = coordinator.run_cycle(&instruments, &config).await;
    coordinator.run_cycle(&instruments, &config).await;

    assert_eq!(first.completed_count(), 2);
    let drop_events = first.report("DROP").unwrap().events().len();
    assert!(drop_events > 0);

    // A fresh pool on the same file sees what the cycles wrote
    drop(coordinator);
    db.pool.close().await;
    let reopened = Database::new(&db_url).await.unwrap();
    let sink = SqliteAnalyticsSink::new(reopened.pool.clone());

    assert_eq!(sink.count_indicator_rows("DROP").await.unwrap(), 100);
    assert_eq!(sink.count_forecast_points("DROP").await.unwrap(), 130);
    assert_eq!(sink.count_indicator_rows("AAPL").await.unwrap(), 180);

    let stored = sink.recent_anomalies(Some("DROP"), 500).await.unwrap();
    assert_eq!(stored.len(), drop_events);
    assert!(stored.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    assert!(stored.iter().any(|r| r.method == "zscore" && r.direction == "below"));

    reopened.pool.close().await;
    std::fs::remove_dir_all(&dir).ok();
}
