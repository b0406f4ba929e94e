//! Alert delivery adapters.
//!
//! Alerts are formatted text messages written to the log. [`ThrottledNotifier`] wraps
//! any notifier to rate-limit repeats per instrument.

pub mod format;
pub mod log_notifier;
pub mod throttle;

pub use log_notifier::LogNotifier;
pub use throttle::{DEFAULT_THROTTLE_MINUTES, ThrottledNotifier};
