// Market data domain
pub mod series;

pub use series::{InstrumentSeries, PricePoint};
