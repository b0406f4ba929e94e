//! Push-based observability
//!
//! Outbound data only, no HTTP server:
//!
//! 1. **Prometheus registry**: counters and histograms updated per cycle, rendered as text
//! 2. **Structured JSON**: one cycle snapshot per cycle on stdout

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::CycleReporter;
