//! Configuration module.
//!
//! Structured configuration loading from environment variables, organized by
//! concern: Analytics, Runtime and Observability.

mod analytics_env_config;
mod observability_config;
mod runtime_env_config;

pub use analytics_env_config::AnalyticsEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use runtime_env_config::{
    DEFAULT_DATABASE_URL, DEFAULT_TICKERS, DataSource, RuntimeEnvConfig, parse_tickers,
};

use crate::domain::config::AnalyticsConfig;
use anyhow::{Context, Result};
use std::env;

/// Variable source; `env::var` in production, a map in tests
pub type Lookup = dyn Fn(&str) -> Option<String>;

pub(crate) fn parse_usize(lookup: &Lookup, key: &str, default: usize) -> Result<usize> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<usize>()
        .context(format!("Failed to parse {}", key))
}

pub(crate) fn parse_u64(lookup: &Lookup, key: &str, default: u64) -> Result<u64> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<u64>()
        .context(format!("Failed to parse {}", key))
}

pub(crate) fn parse_f64(lookup: &Lookup, key: &str, default: f64) -> Result<f64> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<f64>()
        .context(format!("Failed to parse {}", key))
}

pub(crate) fn parse_bool(lookup: &Lookup, key: &str, default: bool) -> bool {
    lookup(key)
        .and_then(|v| v.trim().to_lowercase().parse::<bool>().ok())
        .unwrap_or(default)
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub analytics: AnalyticsConfig,
    pub runtime: RuntimeEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &Lookup) -> Result<Self> {
        let analytics = AnalyticsEnvConfig::from_lookup(lookup)
            .context("Failed to load analytics config")?
            .to_analytics_config()?;
        let runtime =
            RuntimeEnvConfig::from_lookup(lookup).context("Failed to load runtime config")?;
        let observability = ObservabilityEnvConfig::from_lookup(lookup);

        Ok(Self {
            analytics,
            runtime,
            observability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_empty_environment() {
        let config = Config::from_lookup(&|_: &str| None).unwrap();
        assert_eq!(config.analytics, AnalyticsConfig::default());
        assert_eq!(config.runtime.tickers.len(), 4);
        assert!(config.observability.enabled);
    }

    #[test]
    fn test_invalid_analytics_config_aborts() {
        let result = Config::from_lookup(&|key: &str| {
            (key == "RSI_OVERSOLD").then(|| "80".to_string())
        });
        assert!(result.is_err());
    }
}
