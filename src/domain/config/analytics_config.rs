//! Analytics Configuration Domain Value Object
//!
//! Immutable parameters for the indicator engine, the forecaster and the anomaly
//! ensemble. A validated `AnalyticsConfig` is passed explicitly into every cycle.

use crate::domain::analytics::DetectionMethod;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for AnalyticsConfig validation
#[derive(Debug, Error, PartialEq)]
pub enum AnalyticsConfigError {
    #[error("Invalid period: {field} = {value}. Must be > 0")]
    InvalidPeriod { field: String, value: usize },

    #[error("Invalid threshold: {field} = {value}. Must be positive")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Out of range: {field} = {value}. Must be within ({min}, {max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("MACD fast period {fast} must be shorter than slow period {slow}")]
    MacdPeriods { fast: usize, slow: usize },

    #[error("RSI oversold {oversold} must be below overbought {overbought}")]
    RsiBounds { oversold: f64, overbought: f64 },

    #[error("No detection methods enabled")]
    EmptyMethods,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub atr_window: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_window: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_window: 20,
            bollinger_k: 2.0,
            atr_window: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Periods projected past the last observation
    pub horizon: usize,
    /// Band coverage, strictly between 0 and 1
    pub confidence: f64,
    /// Seasonal period in bars. Values below 2 disable the seasonal term.
    pub season_length: usize,
}

impl ForecastSettings {
    /// Fewest points a fit accepts
    pub fn min_history(&self) -> usize {
        self.horizon.saturating_mul(2)
    }

    /// Stable identity for cache keys (f64 by bit pattern)
    pub fn cache_key(&self) -> String {
        format!(
            "h{}-c{:016x}-s{}",
            self.horizon,
            self.confidence.to_bits(),
            self.season_length
        )
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: 30,
            confidence: 0.95,
            season_length: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub zscore_threshold: f64,
    pub zscore_window: usize,
    /// Percentile (1..=100) of observed ATR values that marks a spike
    pub volatility_percentile: usize,
    pub volatility_min_samples: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub methods: Vec<DetectionMethod>,
}

impl DetectionSettings {
    pub fn is_enabled(&self, method: DetectionMethod) -> bool {
        self.methods.contains(&method)
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
            zscore_window: 20,
            volatility_percentile: 95,
            volatility_min_samples: 20,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            methods: DetectionMethod::ALL.to_vec(),
        }
    }
}

/// Analytics configuration value object
///
/// # Invariants
///
/// - All windows and periods are > 0, and `macd_fast < macd_slow`
/// - `forecast.confidence` lies strictly between 0 and 1
/// - `volatility_percentile` lies in 1..=100
/// - `0 < rsi_oversold < rsi_overbought < 100`
/// - At least one detection method is enabled
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub indicators: IndicatorSettings,
    pub forecast: ForecastSettings,
    pub detection: DetectionSettings,
}

impl AnalyticsConfig {
    /// Create a new AnalyticsConfig with validation
    pub fn new(
        indicators: IndicatorSettings,
        forecast: ForecastSettings,
        detection: DetectionSettings,
    ) -> Result<Self, AnalyticsConfigError> {
        let config = Self {
            indicators,
            forecast,
            detection,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalyticsConfigError> {
        let ind = &self.indicators;
        validate_period("rsi_window", ind.rsi_window)?;
        validate_period("macd_fast", ind.macd_fast)?;
        validate_period("macd_slow", ind.macd_slow)?;
        validate_period("macd_signal", ind.macd_signal)?;
        validate_period("bollinger_window", ind.bollinger_window)?;
        validate_period("atr_window", ind.atr_window)?;
        validate_threshold("bollinger_k", ind.bollinger_k)?;

        if ind.macd_fast >= ind.macd_slow {
            return Err(AnalyticsConfigError::MacdPeriods {
                fast: ind.macd_fast,
                slow: ind.macd_slow,
            });
        }

        validate_period("forecast_horizon", self.forecast.horizon)?;
        let confidence = self.forecast.confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalyticsConfigError::OutOfRange {
                field: "forecast_confidence".to_string(),
                value: confidence,
                min: 0.0,
                max: 1.0,
            });
        }

        let det = &self.detection;
        validate_threshold("zscore_threshold", det.zscore_threshold)?;
        validate_period("zscore_window", det.zscore_window)?;
        validate_period("volatility_min_samples", det.volatility_min_samples)?;
        if det.volatility_percentile == 0 || det.volatility_percentile > 100 {
            return Err(AnalyticsConfigError::OutOfRange {
                field: "volatility_percentile".to_string(),
                value: det.volatility_percentile as f64,
                min: 0.0,
                max: 101.0,
            });
        }

        if !(det.rsi_oversold > 0.0
            && det.rsi_oversold < det.rsi_overbought
            && det.rsi_overbought < 100.0)
        {
            return Err(AnalyticsConfigError::RsiBounds {
                oversold: det.rsi_oversold,
                overbought: det.rsi_overbought,
            });
        }

        if det.methods.is_empty() {
            return Err(AnalyticsConfigError::EmptyMethods);
        }

        Ok(())
    }
}

fn validate_period(field: &str, value: usize) -> Result<(), AnalyticsConfigError> {
    if value == 0 {
        return Err(AnalyticsConfigError::InvalidPeriod {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

fn validate_threshold(field: &str, value: f64) -> Result<(), AnalyticsConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(AnalyticsConfigError::InvalidThreshold {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}
