use thiserror::Error;

/// Errors raised by the data-acquisition collaborator. Transient; retried upstream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Market data unavailable for {instrument}: {reason}")]
    Unavailable { instrument: String, reason: String },

    #[error("Unknown instrument: {instrument}")]
    NotFound { instrument: String },

    #[error("Fetch for {instrument} timed out after {duration_ms}ms")]
    Timeout { instrument: String, duration_ms: u64 },

    #[error("Invalid market data for {instrument}: {reason}")]
    InvalidData { instrument: String, reason: String },
}

/// Structural problems in a price series, detected when it is built
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeriesError {
    #[error("Timestamp at index {index} ({current}) does not follow previous ({previous})")]
    NonMonotonic {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("Non-finite or negative {field} at index {index}")]
    InvalidValue { index: usize, field: &'static str },

    #[error("Low {low} above high {high} at index {index}")]
    InvertedRange { index: usize, low: f64, high: f64 },
}

/// Forecaster failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    /// Structural: the caller skips forecast-based methods for this instrument
    #[error("Insufficient history: need {required} points, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Forecast model degenerate: {reason}")]
    Degenerate { reason: String },
}

/// Unexpected numeric failures. The instrument is skipped, the cycle continues.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ComputationError {
    #[error("Invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),

    #[error("Indicator {indicator} failed: {reason}")]
    Indicator {
        indicator: &'static str,
        reason: String,
    },

    #[error("Forecast failed: {0}")]
    Forecast(ForecastError),

    #[error("Worker task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("Invalid analytics config: {reason}")]
    InvalidConfig { reason: String },
}

/// Why an instrument produced no analysis in a cycle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FailureReason {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("computation failed: {0}")]
    Computation(#[from] ComputationError),

    #[error("cycle cancelled")]
    Cancelled,
}

impl FailureReason {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Fetch(_) => "fetch",
            FailureReason::Computation(_) => "computation",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_formatting() {
        let error = FetchError::Timeout {
            instrument: "AAPL".to_string(),
            duration_ms: 7000,
        };

        let msg = error.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("7000"));
    }

    #[test]
    fn test_failure_reason_wraps_sources() {
        let reason: FailureReason = ComputationError::Forecast(ForecastError::Degenerate {
            reason: "sigma is NaN".to_string(),
        })
        .into();

        assert_eq!(reason.kind(), "computation");
        assert!(reason.to_string().contains("sigma is NaN"));
        assert_eq!(FailureReason::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_insufficient_history_formatting() {
        let error = ForecastError::InsufficientHistory {
            required: 60,
            available: 12,
        };
        let msg = error.to_string();
        assert!(msg.contains("60"));
        assert!(msg.contains("12"));
    }
}
