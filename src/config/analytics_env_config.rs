//! Analytics configuration parsing from environment variables.
//!
//! Indicator windows, forecast settings and detection thresholds. The result is
//! validated into an [`AnalyticsConfig`] before anything runs.

use super::{Lookup, parse_f64, parse_usize};
use crate::domain::analytics::DetectionMethod;
use crate::domain::config::{
    AnalyticsConfig, DetectionSettings, ForecastSettings, IndicatorSettings,
};
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AnalyticsEnvConfig {
    // Indicators
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub atr_window: usize,

    // Forecast
    pub forecast_horizon: usize,
    pub forecast_confidence: f64,
    pub forecast_season_length: usize,

    // Detection
    pub zscore_threshold: f64,
    pub zscore_window: usize,
    pub volatility_percentile: usize,
    pub volatility_min_samples: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub methods: Vec<DetectionMethod>,
}

impl AnalyticsEnvConfig {
    pub fn from_lookup(lookup: &Lookup) -> Result<Self> {
        let ind = IndicatorSettings::default();
        let fc = ForecastSettings::default();
        let det = DetectionSettings::default();

        // PROPHET_CONFIDENCE_LEVEL is the older name
        let forecast_confidence = match lookup("FORECAST_CONFIDENCE") {
            Some(_) => parse_f64(lookup, "FORECAST_CONFIDENCE", fc.confidence)?,
            None => parse_f64(lookup, "PROPHET_CONFIDENCE_LEVEL", fc.confidence)?,
        };

        let methods = match lookup("DETECTION_METHODS") {
            Some(raw) if !raw.trim().is_empty() => parse_methods(&raw)?,
            _ => det.methods.clone(),
        };

        Ok(Self {
            rsi_window: parse_usize(lookup, "RSI_WINDOW", ind.rsi_window)?,
            macd_fast: parse_usize(lookup, "MACD_FAST", ind.macd_fast)?,
            macd_slow: parse_usize(lookup, "MACD_SLOW", ind.macd_slow)?,
            macd_signal: parse_usize(lookup, "MACD_SIGNAL", ind.macd_signal)?,
            bollinger_window: parse_usize(lookup, "BOLLINGER_WINDOW", ind.bollinger_window)?,
            bollinger_k: parse_f64(lookup, "BOLLINGER_K", ind.bollinger_k)?,
            atr_window: parse_usize(lookup, "ATR_WINDOW", ind.atr_window)?,

            forecast_horizon: parse_usize(lookup, "FORECAST_HORIZON", fc.horizon)?,
            forecast_confidence,
            forecast_season_length: parse_usize(
                lookup,
                "FORECAST_SEASON_LENGTH",
                fc.season_length,
            )?,

            zscore_threshold: parse_f64(lookup, "ZSCORE_THRESHOLD", det.zscore_threshold)?,
            zscore_window: parse_usize(lookup, "ZSCORE_WINDOW", det.zscore_window)?,
            volatility_percentile: parse_usize(
                lookup,
                "VOLATILITY_PERCENTILE",
                det.volatility_percentile,
            )?,
            volatility_min_samples: parse_usize(
                lookup,
                "VOLATILITY_MIN_SAMPLES",
                det.volatility_min_samples,
            )?,
            rsi_overbought: parse_f64(lookup, "RSI_OVERBOUGHT", det.rsi_overbought)?,
            rsi_oversold: parse_f64(lookup, "RSI_OVERSOLD", det.rsi_oversold)?,
            methods,
        })
    }

    /// Build the validated value object
    pub fn to_analytics_config(&self) -> Result<AnalyticsConfig> {
        AnalyticsConfig::new(
            IndicatorSettings {
                rsi_window: self.rsi_window,
                macd_fast: self.macd_fast,
                macd_slow: self.macd_slow,
                macd_signal: self.macd_signal,
                bollinger_window: self.bollinger_window,
                bollinger_k: self.bollinger_k,
                atr_window: self.atr_window,
            },
            ForecastSettings {
                horizon: self.forecast_horizon,
                confidence: self.forecast_confidence,
                season_length: self.forecast_season_length,
            },
            DetectionSettings {
                zscore_threshold: self.zscore_threshold,
                zscore_window: self.zscore_window,
                volatility_percentile: self.volatility_percentile,
                volatility_min_samples: self.volatility_min_samples,
                rsi_overbought: self.rsi_overbought,
                rsi_oversold: self.rsi_oversold,
                methods: self.methods.clone(),
            },
        )
        .context("Invalid analytics configuration")
    }
}

/// Comma-separated method names; duplicates collapse, order follows the ensemble
fn parse_methods(raw: &str) -> Result<Vec<DetectionMethod>> {
    let mut methods = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<DetectionMethod>())
        .collect::<Result<Vec<_>>>()
        .context("Failed to parse DETECTION_METHODS")?;
    methods.sort();
    methods.dedup();
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_domain_defaults() {
        let env = AnalyticsEnvConfig::from_lookup(&lookup_from(&[])).unwrap();
        let config = env.to_analytics_config().unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_overrides_and_confidence_alias() {
        let env = AnalyticsEnvConfig::from_lookup(&lookup_from(&[
            ("RSI_WINDOW", "7"),
            ("ZSCORE_THRESHOLD", "2.5"),
            ("PROPHET_CONFIDENCE_LEVEL", "0.9"),
            ("DETECTION_METHODS", "rsi, zscore,rsi"),
        ]))
        .unwrap();

        assert_eq!(env.rsi_window, 7);
        assert_eq!(env.zscore_threshold, 2.5);
        assert_eq!(env.forecast_confidence, 0.9);
        assert_eq!(
            env.methods,
            vec![DetectionMethod::ZScore, DetectionMethod::RsiExtreme]
        );
    }

    #[test]
    fn test_new_confidence_name_wins() {
        let env = AnalyticsEnvConfig::from_lookup(&lookup_from(&[
            ("FORECAST_CONFIDENCE", "0.8"),
            ("PROPHET_CONFIDENCE_LEVEL", "0.9"),
        ]))
        .unwrap();
        assert_eq!(env.forecast_confidence, 0.8);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AnalyticsEnvConfig::from_lookup(&lookup_from(&[("RSI_WINDOW", "abc")])).is_err());
        assert!(
            AnalyticsEnvConfig::from_lookup(&lookup_from(&[("DETECTION_METHODS", "magic")]))
                .is_err()
        );

        let env =
            AnalyticsEnvConfig::from_lookup(&lookup_from(&[("MACD_FAST", "30")])).unwrap();
        assert!(env.to_analytics_config().is_err());
    }
}
