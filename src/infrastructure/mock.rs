use crate::domain::analytics::AnomalyEvent;
use crate::domain::cycle::AnalysisFrames;
use crate::domain::errors::FetchError;
use crate::domain::market::{InstrumentSeries, PricePoint};
use crate::domain::ports::{AlertNotifier, AnalyticsSink, SeriesFetcher};
use anyhow::{Result, bail};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const DAY_MS: i64 = 86_400_000;
/// 2024-01-02T00:00:00Z
const DEFAULT_START_MS: i64 = 1_704_153_600_000;

/// Deterministic market data for demos and tests.
///
/// Unknown instruments get a synthetic daily random walk seeded from the instrument
/// name, so repeated fetches return identical series. Fixed series and failures can
/// be registered per instrument.
#[derive(Clone)]
pub struct MockSeriesFetcher {
    fixed: HashMap<String, InstrumentSeries>,
    failures: HashMap<String, FetchError>,
    delay: Option<Duration>,
    start_ms: i64,
    calls: Arc<AtomicUsize>,
}

impl MockSeriesFetcher {
    pub fn new() -> Self {
        Self {
            fixed: HashMap::new(),
            failures: HashMap::new(),
            delay: None,
            start_ms: DEFAULT_START_MS,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_series(mut self, series: InstrumentSeries) -> Self {
        self.fixed.insert(series.instrument().to_string(), series);
        self
    }

    pub fn with_failure(mut self, instrument: &str, error: FetchError) -> Self {
        self.failures.insert(instrument.to_string(), error);
        self
    }

    /// Simulated network latency applied to every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seed(instrument: &str) -> u64 {
        // FNV-1a
        instrument
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            })
    }

    /// Daily random walk with bounded returns and intraday ranges
    pub fn synthetic_series(
        &self,
        instrument: &str,
        bars: usize,
    ) -> Result<InstrumentSeries, FetchError> {
        let mut rng = StdRng::seed_from_u64(Self::seed(instrument));
        let mut close: f64 = rng.random_range(20.0..500.0);

        let points = (0..bars)
            .map(|i| {
                let open = close;
                close = (open * (1.0 + rng.random_range(-0.02..0.02))).max(0.01);
                let high = open.max(close) * (1.0 + rng.random_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.random_range(0.0..0.01));
                let volume = rng.random_range(100_000.0..5_000_000.0_f64).round();
                PricePoint::new(
                    self.start_ms + i as i64 * DAY_MS,
                    open,
                    high,
                    low,
                    close,
                    volume,
                )
            })
            .collect();

        InstrumentSeries::new(instrument, points).map_err(|e| FetchError::InvalidData {
            instrument: instrument.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for MockSeriesFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeriesFetcher for MockSeriesFetcher {
    async fn fetch_series(
        &self,
        instrument: &str,
        lookback: usize,
    ) -> Result<InstrumentSeries, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.get(instrument) {
            return Err(error.clone());
        }
        if let Some(series) = self.fixed.get(instrument) {
            return Ok(series.tail(lookback));
        }

        debug!(
            "MockSeriesFetcher: synthesizing {} bars for {}",
            lookback, instrument
        );
        self.synthetic_series(instrument, lookback)
    }
}

/// Sink that keeps everything it receives in memory
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<RwLock<Vec<(AnalysisFrames, Vec<AnomalyEvent>)>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn records(&self) -> Vec<(AnalysisFrames, Vec<AnomalyEvent>)> {
        self.records.read().await.clone()
    }

    pub async fn instruments(&self) -> Vec<String> {
        self.records
            .read()
            .await
            .iter()
            .map(|(frames, _)| frames.instrument.clone())
            .collect()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn persist(&self, frames: &AnalysisFrames, events: &[AnomalyEvent]) -> Result<()> {
        if self.fail {
            bail!("recording sink configured to fail");
        }
        self.records
            .write()
            .await
            .push((frames.clone(), events.to_vec()));
        Ok(())
    }
}

/// Notifier that records each call
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    notifications: Arc<RwLock<Vec<(String, Vec<AnomalyEvent>)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn notifications(&self) -> Vec<(String, Vec<AnomalyEvent>)> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, instrument: &str, events: &[AnomalyEvent]) -> Result<()> {
        if self.fail {
            bail!("recording notifier configured to fail");
        }
        self.notifications
            .write()
            .await
            .push((instrument.to_string(), events.to_vec()));
        Ok(())
    }
}
