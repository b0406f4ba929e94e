// Technical indicators over a price series
pub mod indicators;

// Expected-value bands and the per-snapshot model cache
pub mod forecasting;

// Independent detectors and the policies that interpret them
pub mod detection;

// Refresh cycles and their scheduling
pub mod pipeline;

// Adapter wiring
pub mod system;
