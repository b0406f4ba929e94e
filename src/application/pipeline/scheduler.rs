use super::coordinator::PipelineCoordinator;
use crate::domain::config::AnalyticsConfig;
use crate::domain::cycle::CycleResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Receives every finished cycle (metrics, reporting)
pub trait CycleObserver: Send + Sync {
    fn on_cycle(&self, result: &CycleResult);
}

struct InFlight {
    cancel: CancellationToken,
    handle: JoinHandle<CycleResult>,
}

/// Triggers a refresh cycle every `interval`.
///
/// The first tick fires immediately and missed ticks are skipped. A tick that arrives
/// while a cycle is still running cancels that cycle and waits for it before starting
/// the next one, so at most one cycle runs at a time.
pub struct RefreshScheduler {
    coordinator: PipelineCoordinator,
    instruments: Arc<Vec<String>>,
    config: Arc<AnalyticsConfig>,
    interval: Duration,
    observers: Vec<Arc<dyn CycleObserver>>,
}

impl RefreshScheduler {
    pub fn new(
        coordinator: PipelineCoordinator,
        instruments: Vec<String>,
        config: AnalyticsConfig,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            instruments: Arc::new(instruments),
            config: Arc::new(config),
            interval,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn start_cycle(&self, shutdown: &CancellationToken) -> InFlight {
        let cancel = shutdown.child_token();
        let coordinator = self.coordinator.clone();
        let instruments = self.instruments.clone();
        let config = self.config.clone();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            coordinator
                .run_cycle_until(&instruments, &config, token)
                .await
        });
        InFlight { cancel, handle }
    }

    fn publish(&self, joined: Result<CycleResult, tokio::task::JoinError>) {
        match joined {
            Ok(result) => {
                for observer in &self.observers {
                    observer.on_cycle(&result);
                }
            }
            Err(e) => error!("Refresh cycle task failed: {}", e),
        }
    }

    /// Run until `shutdown` is cancelled. The running cycle is cancelled on shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Refresh scheduler started: {} instruments every {:?}",
            self.instruments.len(),
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<InFlight> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Some(cycle) = in_flight.take() {
                        cycle.cancel.cancel();
                        self.publish(cycle.handle.await);
                    }
                    break;
                }
                joined = async {
                    match in_flight.as_mut() {
                        Some(cycle) => (&mut cycle.handle).await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    self.publish(joined);
                }
                _ = ticker.tick() => {
                    if let Some(cycle) = in_flight.take() {
                        warn!("Refresh tick while previous cycle still running; cancelling it");
                        cycle.cancel.cancel();
                        self.publish(cycle.handle.await);
                    }
                    in_flight = Some(self.start_cycle(&shutdown));
                }
            }
        }

        info!("Refresh scheduler stopped");
    }
}
