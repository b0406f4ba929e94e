//! Refresh-cycle orchestration.

pub mod coordinator;
pub mod scheduler;

pub use coordinator::PipelineCoordinator;
pub use scheduler::{CycleObserver, RefreshScheduler};
