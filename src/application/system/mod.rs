//! Application assembly: builds the adapters named by [`Config`] and wires them into
//! a [`PipelineCoordinator`] and its [`RefreshScheduler`].

use crate::application::detection::policy::{CompositeScorer, ConfirmationPolicy};
use crate::application::forecasting::{CachedForecaster, TrendSeasonalForecaster};
use crate::application::pipeline::{CycleObserver, PipelineCoordinator, RefreshScheduler};
use crate::config::{Config, DataSource};
use crate::domain::cycle::CycleResult;
use crate::domain::ports::{AlertNotifier, AnalyticsSink, Forecaster, SeriesFetcher};
use crate::infrastructure::alerts::{LogNotifier, ThrottledNotifier};
use crate::infrastructure::csv_fetcher::CsvSeriesFetcher;
use crate::infrastructure::mock::MockSeriesFetcher;
use crate::infrastructure::observability::{CycleReporter, Metrics};
use crate::infrastructure::persistence::{Database, SqliteAnalyticsSink};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Application {
    config: Config,
    coordinator: PipelineCoordinator,
    database: Database,
    observers: Vec<Arc<dyn CycleObserver>>,
    metrics: Option<Metrics>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        let runtime = &config.runtime;

        let fetcher: Arc<dyn SeriesFetcher> = match runtime.data_source {
            DataSource::Mock => {
                info!("Data source: deterministic mock series");
                Arc::new(MockSeriesFetcher::new())
            }
            DataSource::Csv => {
                info!("Data source: CSV files in {}", runtime.data_dir.display());
                Arc::new(CsvSeriesFetcher::new(runtime.data_dir.clone()))
            }
        };

        let forecaster: Arc<dyn Forecaster> =
            Arc::new(CachedForecaster::new(Arc::new(TrendSeasonalForecaster::new())));

        let database = Database::new(&runtime.database_url)
            .await
            .context("Failed to open analytics database")?;
        let sink: Arc<dyn AnalyticsSink> = Arc::new(SqliteAnalyticsSink::new(database.pool.clone()));

        let log_notifier = LogNotifier::new(
            ConfirmationPolicy::new(runtime.confirmation_min_methods),
            CompositeScorer::default(),
        );
        let notifier: Arc<dyn AlertNotifier> = Arc::new(ThrottledNotifier::with_minutes(
            Arc::new(log_notifier),
            runtime.alert_throttle_minutes,
        ));

        let coordinator = PipelineCoordinator::new(fetcher, forecaster, sink, notifier)
            .with_lookback(runtime.lookback_bars)
            .with_max_concurrency(runtime.max_concurrency);

        let mut observers: Vec<Arc<dyn CycleObserver>> = Vec::new();
        let metrics = if config.observability.enabled {
            let metrics = Metrics::new().context("Failed to register metrics")?;
            observers.push(Arc::new(CycleReporter::new(Some(metrics.clone()))));
            Some(metrics)
        } else {
            None
        };

        Ok(Self {
            config,
            coordinator,
            database,
            observers,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.coordinator
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// One cycle over the configured tickers, reported to the observers
    pub async fn run_once(&self) -> CycleResult {
        let result = self
            .coordinator
            .run_cycle(&self.config.runtime.tickers, &self.config.analytics)
            .await;
        for observer in &self.observers {
            observer.on_cycle(&result);
        }
        result
    }

    pub fn scheduler(&self) -> RefreshScheduler {
        let interval = Duration::from_secs(self.config.runtime.fetch_interval_minutes * 60);
        self.observers.iter().fold(
            RefreshScheduler::new(
                self.coordinator.clone(),
                self.config.runtime.tickers.clone(),
                self.config.analytics.clone(),
                interval,
            ),
            |scheduler, observer| scheduler.with_observer(observer.clone()),
        )
    }

    /// Refresh on the configured interval until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        self.scheduler().run(shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(&|key: &str| match key {
            "STOCK_TICKERS" => Some("AAPL,MSFT".to_string()),
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        })
        .unwrap();
        config.runtime.alert_throttle_minutes = 0;
        config
    }

    #[tokio::test]
    async fn test_run_once_with_mock_source() {
        let app = Application::build(test_config()).await.unwrap();
        let result = app.run_once().await;

        assert_eq!(result.completed_count(), 2);
        assert_eq!(result.failed_count(), 0);

        let metrics = app.metrics().unwrap();
        assert_eq!(metrics.cycles_total.get(), 1);

        let sink = SqliteAnalyticsSink::new(app.database().pool.clone());
        assert_eq!(sink.count_indicator_rows("AAPL").await.unwrap(), 180);
    }

    #[tokio::test]
    async fn test_csv_source_reports_missing_files() {
        let mut config = test_config();
        config.runtime.data_source = DataSource::Csv;
        config.runtime.data_dir = std::env::temp_dir().join("no-such-anomaly-data");
        config.observability.enabled = false;

        let app = Application::build(config).await.unwrap();
        let result = app.run_once().await;
        assert_eq!(result.failed_count(), 2);
        assert!(app.metrics().is_none());
    }
}
