use crate::domain::analytics::{AnomalyEvent, ForecastFrame};
use crate::domain::config::ForecastSettings;
use crate::domain::cycle::AnalysisFrames;
use crate::domain::errors::{FetchError, ForecastError};
use crate::domain::market::InstrumentSeries;
use anyhow::Result;
use async_trait::async_trait;

/// Data acquisition collaborator
#[async_trait]
pub trait SeriesFetcher: Send + Sync {
    /// Return at most `lookback` of the most recent bars for `instrument`
    async fn fetch_series(
        &self,
        instrument: &str,
        lookback: usize,
    ) -> Result<InstrumentSeries, FetchError>;
}

/// Persistence collaborator for computed frames and anomalies
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn persist(&self, frames: &AnalysisFrames, events: &[AnomalyEvent]) -> Result<()>;
}

/// Notification channel. Called once per completed instrument with a non-empty event set.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, instrument: &str, events: &[AnomalyEvent]) -> Result<()>;
}

/// Probabilistic forecaster. CPU-bound, so callers run it on a blocking worker.
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &str;

    fn fit(
        &self,
        series: &InstrumentSeries,
        settings: &ForecastSettings,
    ) -> Result<ForecastFrame, ForecastError>;
}
