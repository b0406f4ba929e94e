pub mod analytics_repository;
pub mod database;

pub use analytics_repository::{AnomalyRecord, SqliteAnalyticsSink};
pub use database::Database;
