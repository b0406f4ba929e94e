//! Observability configuration parsing from environment variables.

use super::{Lookup, parse_bool};

#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    /// Prometheus counters and the per-cycle JSON snapshot
    pub enabled: bool,
    pub log_level: String,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_lookup(lookup: &Lookup) -> Self {
        Self {
            enabled: parse_bool(lookup, "OBSERVABILITY_ENABLED", true),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}
