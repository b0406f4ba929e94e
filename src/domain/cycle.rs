//! Results of one refresh cycle.

use crate::domain::analytics::{AnomalyEvent, ForecastFrame, IndicatorFrame};
use crate::domain::errors::{FailureReason, ForecastError};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Frames computed for one instrument in one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFrames {
    pub instrument: String,
    /// Series fingerprint the frames were computed from
    pub fingerprint: String,
    pub indicators: IndicatorFrame,
    pub forecast: Option<ForecastFrame>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentAnalysis {
    pub frames: AnalysisFrames,
    pub points: usize,
    pub events: Vec<AnomalyEvent>,
    /// Set when the forecaster declined the series (forecast methods skipped)
    pub forecast_skipped: Option<ForecastError>,
    /// Sink and notifier failures, logged but never fatal
    pub delivery_errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Completed(Box<InstrumentAnalysis>),
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentReport {
    pub instrument: String,
    pub outcome: InstrumentOutcome,
    pub duration_ms: u64,
}

impl InstrumentReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, InstrumentOutcome::Completed(_))
    }

    pub fn analysis(&self) -> Option<&InstrumentAnalysis> {
        match &self.outcome {
            InstrumentOutcome::Completed(analysis) => Some(analysis),
            InstrumentOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            InstrumentOutcome::Completed(_) => None,
            InstrumentOutcome::Failed(reason) => Some(reason),
        }
    }

    pub fn events(&self) -> &[AnomalyEvent] {
        self.analysis().map(|a| a.events.as_slice()).unwrap_or(&[])
    }
}

/// Outcome of `run_cycle`: one report per distinct requested instrument, in request order
#[derive(Debug, Clone, PartialEq)]
pub struct CycleResult {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub reports: Vec<InstrumentReport>,
}

impl CycleResult {
    pub fn report(&self, instrument: &str) -> Option<&InstrumentReport> {
        self.reports.iter().find(|r| r.instrument == instrument)
    }

    pub fn completed(&self) -> impl Iterator<Item = &InstrumentReport> {
        self.reports.iter().filter(|r| r.is_completed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &InstrumentReport> {
        self.reports.iter().filter(|r| !r.is_completed())
    }

    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn total_events(&self) -> usize {
        self.reports.iter().map(|r| r.events().len()).sum()
    }

    pub fn all_events(&self) -> impl Iterator<Item = &AnomalyEvent> {
        self.reports.iter().flat_map(|r| r.events().iter())
    }

    pub fn was_cancelled(&self) -> bool {
        self.reports
            .iter()
            .any(|r| matches!(r.failure(), Some(FailureReason::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{DetectionMethod, Direction};
    use crate::domain::errors::FetchError;

    fn completed(instrument: &str, events: usize) -> InstrumentReport {
        let events = (0..events)
            .map(|i| {
                AnomalyEvent::new(
                    i as i64,
                    instrument,
                    DetectionMethod::ZScore,
                    Direction::Above,
                    1.0,
                    0.0,
                    0.1,
                    "",
                )
            })
            .collect();
        InstrumentReport {
            instrument: instrument.to_string(),
            outcome: InstrumentOutcome::Completed(Box::new(InstrumentAnalysis {
                frames: AnalysisFrames {
                    instrument: instrument.to_string(),
                    fingerprint: String::new(),
                    indicators: IndicatorFrame::default(),
                    forecast: None,
                },
                points: 0,
                events,
                forecast_skipped: None,
                delivery_errors: 0,
            })),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_cycle_result_counts() {
        let result = CycleResult {
            started_at: Utc::now(),
            duration_ms: 5,
            reports: vec![
                completed("AAPL", 2),
                InstrumentReport {
                    instrument: "BAD".to_string(),
                    outcome: InstrumentOutcome::Failed(FailureReason::Fetch(
                        FetchError::NotFound {
                            instrument: "BAD".to_string(),
                        },
                    )),
                    duration_ms: 1,
                },
                completed("MSFT", 1),
            ],
        };

        assert_eq!(result.completed_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.total_events(), 3);
        assert!(!result.was_cancelled());
        assert_eq!(result.report("BAD").unwrap().failure().unwrap().kind(), "fetch");
        assert!(result.report("BAD").unwrap().events().is_empty());
    }
}
