//! Forecasters producing expected-value bands over history and a forward horizon.

pub mod model_cache;
pub mod trend_forecaster;

pub use model_cache::CachedForecaster;
pub use trend_forecaster::TrendSeasonalForecaster;
