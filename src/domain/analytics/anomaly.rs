use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Independent anomaly detectors run by the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectionMethod {
    ZScore,
    ForecastDeviation,
    VolatilitySpike,
    BollingerBreakout,
    RsiExtreme,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 5] = [
        DetectionMethod::ZScore,
        DetectionMethod::ForecastDeviation,
        DetectionMethod::VolatilitySpike,
        DetectionMethod::BollingerBreakout,
        DetectionMethod::RsiExtreme,
    ];

    /// Severity is a property of the method, fixed when an event is created
    pub fn severity(&self) -> Severity {
        match self {
            DetectionMethod::ZScore | DetectionMethod::ForecastDeviation => Severity::High,
            DetectionMethod::VolatilitySpike | DetectionMethod::BollingerBreakout => {
                Severity::Medium
            }
            DetectionMethod::RsiExtreme => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::ZScore => "zscore",
            DetectionMethod::ForecastDeviation => "forecast_deviation",
            DetectionMethod::VolatilitySpike => "volatility_spike",
            DetectionMethod::BollingerBreakout => "bollinger_breakout",
            DetectionMethod::RsiExtreme => "rsi_extreme",
        }
    }

    pub fn uses_forecast(&self) -> bool {
        matches!(self, DetectionMethod::ForecastDeviation)
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z_score" => Ok(DetectionMethod::ZScore),
            "forecast_deviation" | "prophet_deviation" | "forecast" => {
                Ok(DetectionMethod::ForecastDeviation)
            }
            "volatility_spike" | "volatility" => Ok(DetectionMethod::VolatilitySpike),
            "bollinger_breakout" | "bollinger" => Ok(DetectionMethod::BollingerBreakout),
            "rsi_extreme" | "rsi" => Ok(DetectionMethod::RsiExtreme),
            _ => Err(anyhow!(
                "Invalid detection method: {}. Must be one of zscore, forecast_deviation, volatility_spike, bollinger_breakout, rsi_extreme",
                s
            )),
        }
    }
}

/// Alert severity. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Above,
    Below,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => write!(f, "above"),
            Direction::Below => write!(f, "below"),
        }
    }
}

/// A single threshold crossing by one detection method at one timestamp.
///
/// Immutable once created: fields are private and severity comes from the method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    timestamp: i64,
    instrument: String,
    method: DetectionMethod,
    severity: Severity,
    direction: Direction,
    observed_value: f64,
    reference_value: f64,
    score: f64,
    description: String,
}

impl AnomalyEvent {
    pub fn new(
        timestamp: i64,
        instrument: impl Into<String>,
        method: DetectionMethod,
        direction: Direction,
        observed_value: f64,
        reference_value: f64,
        score: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            instrument: instrument.into(),
            method,
            severity: method.severity(),
            direction,
            observed_value,
            reference_value,
            score,
            description: description.into(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn observed_value(&self) -> f64 {
        self.observed_value
    }

    pub fn reference_value(&self) -> f64 {
        self.reference_value
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Timestamp rendered as UTC, or the raw millis if out of range
    pub fn timestamp_label(&self) -> String {
        match Utc.timestamp_millis_opt(self.timestamp).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => self.timestamp.to_string(),
        }
    }
}

impl fmt::Display for AnomalyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} at {}: {}",
            self.severity,
            self.instrument,
            self.method,
            self.timestamp_label(),
            self.description
        )
    }
}
