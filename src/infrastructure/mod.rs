pub mod alerts;
pub mod csv_fetcher;
pub mod mock;
pub mod observability;
pub mod persistence;

pub use alerts::{LogNotifier, ThrottledNotifier};
pub use csv_fetcher::CsvSeriesFetcher;
pub use mock::{MockSeriesFetcher, RecordingNotifier, RecordingSink};
pub use persistence::{Database, SqliteAnalyticsSink};
