use crate::application::detection::AnomalyEnsemble;
use crate::application::indicators::compute_indicators;
use crate::domain::analytics::{AnomalyEvent, ForecastFrame, IndicatorFrame};
use crate::domain::config::AnalyticsConfig;
use crate::domain::cycle::{
    AnalysisFrames, CycleResult, InstrumentAnalysis, InstrumentOutcome, InstrumentReport,
};
use crate::domain::errors::{ComputationError, FailureReason, ForecastError};
use crate::domain::market::InstrumentSeries;
use crate::domain::ports::{AlertNotifier, AnalyticsSink, Forecaster, SeriesFetcher};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_LOOKBACK_BARS: usize = 180;

type Frames = (IndicatorFrame, Result<ForecastFrame, ForecastError>);

/// Runs one refresh cycle: fetch, indicators and forecast, ensemble, persist, notify.
///
/// Each instrument runs on its own task, bounded by `max_concurrency`. A failure in one
/// instrument never affects the others, and no error escapes a cycle.
///
/// Every cycle re-detects over the whole lookback window, so the notifier only receives
/// events newer than the last one already delivered for that instrument.
#[derive(Clone)]
pub struct PipelineCoordinator {
    fetcher: Arc<dyn SeriesFetcher>,
    forecaster: Arc<dyn Forecaster>,
    sink: Arc<dyn AnalyticsSink>,
    notifier: Arc<dyn AlertNotifier>,
    lookback: usize,
    max_concurrency: usize,
    notified_through: Arc<Mutex<HashMap<String, i64>>>,
}

impl PipelineCoordinator {
    pub fn new(
        fetcher: Arc<dyn SeriesFetcher>,
        forecaster: Arc<dyn Forecaster>,
        sink: Arc<dyn AnalyticsSink>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            fetcher,
            forecaster,
            sink,
            notifier,
            lookback: DEFAULT_LOOKBACK_BARS,
            max_concurrency: 0,
            notified_through: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Maximum instruments processed at once. 0 uses the available cores.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    fn permits(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub async fn run_cycle(&self, instruments: &[String], config: &AnalyticsConfig) -> CycleResult {
        self.run_cycle_until(instruments, config, CancellationToken::new())
            .await
    }

    /// Run a cycle that stops early once `cancel` fires.
    ///
    /// Cancelled instruments are reported as `FailureReason::Cancelled` and emit nothing.
    pub async fn run_cycle_until(
        &self,
        instruments: &[String],
        config: &AnalyticsConfig,
        cancel: CancellationToken,
    ) -> CycleResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut seen = HashSet::new();
        let unique: Vec<String> = instruments
            .iter()
            .filter(|i| seen.insert(i.as_str()))
            .cloned()
            .collect();
        if unique.len() < instruments.len() {
            debug!(
                "Ignoring {} duplicate instrument(s) in cycle request",
                instruments.len() - unique.len()
            );
        }

        if let Err(e) = config.validate() {
            error!("Rejecting cycle, analytics config is invalid: {}", e);
            let reason = ComputationError::InvalidConfig {
                reason: e.to_string(),
            };
            return CycleResult {
                started_at,
                duration_ms: clock.elapsed().as_millis() as u64,
                reports: unique
                    .into_iter()
                    .map(|instrument| InstrumentReport {
                        instrument,
                        outcome: InstrumentOutcome::Failed(FailureReason::Computation(
                            reason.clone(),
                        )),
                        duration_ms: 0,
                    })
                    .collect(),
            };
        }

        info!(
            "Cycle started: {} instruments (max concurrency {})",
            unique.len(),
            self.permits()
        );

        let semaphore = Arc::new(Semaphore::new(self.permits()));
        let config = Arc::new(config.clone());
        let mut tasks = JoinSet::new();
        let mut task_instruments = HashMap::new();

        for instrument in &unique {
            let this = self.clone();
            let instrument_name = instrument.clone();
            let config = config.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            let handle = tasks.spawn(async move {
                let task_clock = Instant::now();
                let outcome = this
                    .process_instrument(&instrument_name, &config, &semaphore, &cancel)
                    .await;
                InstrumentReport {
                    instrument: instrument_name,
                    outcome,
                    duration_ms: task_clock.elapsed().as_millis() as u64,
                }
            });
            task_instruments.insert(handle.id(), instrument.clone());
        }

        let mut reports: HashMap<String, InstrumentReport> = HashMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, report)) => {
                    reports.insert(report.instrument.clone(), report);
                }
                Err(e) => {
                    let Some(instrument) = task_instruments.get(&e.id()).cloned() else {
                        error!("Join error for unknown task: {}", e);
                        continue;
                    };
                    error!("Task for {} failed: {}", instrument, e);
                    reports.insert(
                        instrument.clone(),
                        InstrumentReport {
                            instrument,
                            outcome: InstrumentOutcome::Failed(FailureReason::Computation(
                                ComputationError::TaskFailed {
                                    reason: e.to_string(),
                                },
                            )),
                            duration_ms: 0,
                        },
                    );
                }
            }
        }

        let ordered: Vec<InstrumentReport> = unique
            .iter()
            .filter_map(|i| reports.remove(i))
            .collect();

        let result = CycleResult {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            reports: ordered,
        };

        info!(
            "Cycle finished in {}ms: {} completed, {} failed, {} events",
            result.duration_ms,
            result.completed_count(),
            result.failed_count(),
            result.total_events()
        );
        result
    }

    async fn process_instrument(
        &self,
        instrument: &str,
        config: &Arc<AnalyticsConfig>,
        semaphore: &Semaphore,
        cancel: &CancellationToken,
    ) -> InstrumentOutcome {
        if cancel.is_cancelled() {
            return InstrumentOutcome::Failed(FailureReason::Cancelled);
        }

        let _permit = tokio::select! {
            _ = cancel.cancelled() => return InstrumentOutcome::Failed(FailureReason::Cancelled),
            permit = semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    return InstrumentOutcome::Failed(FailureReason::Computation(
                        ComputationError::TaskFailed { reason: e.to_string() },
                    ));
                }
            },
        };

        let series = tokio::select! {
            _ = cancel.cancelled() => return InstrumentOutcome::Failed(FailureReason::Cancelled),
            fetched = self.fetcher.fetch_series(instrument, self.lookback) => match fetched {
                Ok(series) => Arc::new(series),
                Err(e) => {
                    warn!("Fetch failed for {}: {}", instrument, e);
                    return InstrumentOutcome::Failed(FailureReason::Fetch(e));
                }
            },
        };
        debug!("Fetched {} bars for {}", series.len(), instrument);

        let (indicators, forecast) = match self.compute_frames(&series, config).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Computation failed for {}: {}", instrument, e);
                return InstrumentOutcome::Failed(FailureReason::Computation(e));
            }
        };
        let (forecast, forecast_skipped) = match forecast {
            Ok(frame) => (Some(frame), None),
            Err(reason @ ForecastError::InsufficientHistory { .. }) => {
                info!("Forecast skipped for {}: {}", instrument, reason);
                (None, Some(reason))
            }
            Err(e) => {
                warn!("Forecast failed for {}: {}", instrument, e);
                return InstrumentOutcome::Failed(FailureReason::Computation(
                    ComputationError::Forecast(e),
                ));
            }
        };

        if cancel.is_cancelled() {
            return InstrumentOutcome::Failed(FailureReason::Cancelled);
        }

        let events = AnomalyEnsemble::new(&config.detection).detect(
            &series,
            &indicators,
            forecast.as_ref(),
        );

        if cancel.is_cancelled() {
            return InstrumentOutcome::Failed(FailureReason::Cancelled);
        }

        let frames = AnalysisFrames {
            instrument: instrument.to_string(),
            fingerprint: series.fingerprint(),
            indicators,
            forecast,
        };

        let mut delivery_errors = 0;
        if let Err(e) = self.sink.persist(&frames, &events).await {
            error!("Failed to persist analysis for {}: {:#}", instrument, e);
            delivery_errors += 1;
        }
        let fresh = self.unnotified(instrument, &events);
        if !fresh.is_empty() {
            match self.notifier.notify(instrument, &fresh).await {
                Ok(()) => self.mark_notified(instrument, &fresh),
                Err(e) => {
                    error!("Failed to notify anomalies for {}: {:#}", instrument, e);
                    delivery_errors += 1;
                }
            }
        } else if !events.is_empty() {
            debug!(
                "No new anomalies for {} ({} already notified)",
                instrument,
                events.len()
            );
        }

        InstrumentOutcome::Completed(Box::new(InstrumentAnalysis {
            frames,
            points: series.len(),
            events,
            forecast_skipped,
            delivery_errors,
        }))
    }

    /// Events after the last timestamp already delivered for `instrument`
    fn unnotified(&self, instrument: &str, events: &[AnomalyEvent]) -> Vec<AnomalyEvent> {
        let through = match self.notified_through.lock() {
            Ok(guard) => guard.get(instrument).copied(),
            Err(poisoned) => poisoned.into_inner().get(instrument).copied(),
        };
        events
            .iter()
            .filter(|e| through.is_none_or(|t| e.timestamp() > t))
            .cloned()
            .collect()
    }

    fn mark_notified(&self, instrument: &str, delivered: &[AnomalyEvent]) {
        let Some(latest) = delivered.iter().map(|e| e.timestamp()).max() else {
            return;
        };
        let mut guard = match self.notified_through.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = guard.entry(instrument.to_string()).or_insert(latest);
        *entry = (*entry).max(latest);
    }

    /// Indicators inline, forecast on a blocking worker. Both finish before returning.
    async fn compute_frames(
        &self,
        series: &Arc<InstrumentSeries>,
        config: &AnalyticsConfig,
    ) -> Result<Frames, ComputationError> {
        let forecaster = self.forecaster.clone();
        let fit_series = series.clone();
        let settings = config.forecast.clone();
        let fit = tokio::task::spawn_blocking(move || forecaster.fit(&fit_series, &settings));

        let indicators = compute_indicators(series, &config.indicators);

        let forecast = fit.await.map_err(|e| ComputationError::TaskFailed {
            reason: format!("forecast worker: {}", e),
        })?;
        Ok((indicators?, forecast))
    }
}
