//! Push-based cycle reporter
//!
//! Writes one JSON snapshot per cycle to stdout, prefixed with `CYCLE_JSON:` so log
//! shippers can filter it. Nothing is served; data only flows out.

use crate::application::pipeline::CycleObserver;
use crate::domain::cycle::{CycleResult, InstrumentOutcome};
use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct CycleSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub duration_ms: u64,
    pub completed: usize,
    pub failed: usize,
    pub total_events: usize,
    pub instruments: Vec<InstrumentSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct InstrumentSnapshot {
    pub instrument: String,
    pub status: String,
    pub duration_ms: u64,
    pub points: usize,
    pub events: usize,
    pub forecast_skipped: bool,
    pub error: Option<String>,
}

pub struct CycleReporter {
    metrics: Option<Metrics>,
    start_time: Instant,
}

impl CycleReporter {
    pub fn new(metrics: Option<Metrics>) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
        }
    }

    pub fn snapshot(&self, result: &CycleResult) -> CycleSnapshot {
        let instruments = result
            .reports
            .iter()
            .map(|report| match &report.outcome {
                InstrumentOutcome::Completed(analysis) => InstrumentSnapshot {
                    instrument: report.instrument.clone(),
                    status: "completed".to_string(),
                    duration_ms: report.duration_ms,
                    points: analysis.points,
                    events: analysis.events.len(),
                    forecast_skipped: analysis.forecast_skipped.is_some(),
                    error: None,
                },
                InstrumentOutcome::Failed(reason) => InstrumentSnapshot {
                    instrument: report.instrument.clone(),
                    status: reason.kind().to_string(),
                    duration_ms: report.duration_ms,
                    points: 0,
                    events: 0,
                    forecast_skipped: false,
                    error: Some(reason.to_string()),
                },
            })
            .collect();

        CycleSnapshot {
            timestamp: result.started_at.to_rfc3339(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            duration_ms: result.duration_ms,
            completed: result.completed_count(),
            failed: result.failed_count(),
            total_events: result.total_events(),
            instruments,
        }
    }
}

impl CycleObserver for CycleReporter {
    fn on_cycle(&self, result: &CycleResult) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(result);
        }

        let snapshot = self.snapshot(result);
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                println!("CYCLE_JSON:{}", json);
                info!(
                    "Cycle: {} completed | {} failed | {} events | {}ms",
                    snapshot.completed, snapshot.failed, snapshot.total_events, snapshot.duration_ms
                );
            }
            Err(e) => warn!("Failed to serialize cycle snapshot: {}", e),
        }
    }
}
