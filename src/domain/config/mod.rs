//! Configuration domain module
//!
//! Validated value objects handed to the analytics components on every call.

pub mod analytics_config;

pub use analytics_config::{
    AnalyticsConfig, AnalyticsConfigError, DetectionSettings, ForecastSettings,
    IndicatorSettings,
};
