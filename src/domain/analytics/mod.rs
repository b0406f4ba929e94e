//! Analytics value types shared by the indicator engine, forecaster and ensemble.

pub mod anomaly;
pub mod forecast_frame;
pub mod indicator_frame;

pub use anomaly::{AnomalyEvent, DetectionMethod, Direction, Severity};
pub use forecast_frame::{ForecastFrame, ForecastKind, ForecastPoint};
pub use indicator_frame::{IndicatorFrame, IndicatorRow};
