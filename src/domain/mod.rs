// Analytics value types (frames, anomaly events)
pub mod analytics;

// Validated analytics configuration
pub mod config;

// Cycle results
pub mod cycle;

// Domain-specific error types
pub mod errors;

// Market data domain
pub mod market;

// Port interfaces
pub mod ports;
