use crate::domain::errors::FetchError;
use crate::domain::market::{InstrumentSeries, PricePoint};
use crate::domain::ports::SeriesFetcher;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Reads `<dir>/<INSTRUMENT>.csv` with header `timestamp,open,high,low,close,volume`.
///
/// Timestamps may be epoch milliseconds, RFC 3339 or `YYYY-MM-DD` (midnight UTC).
/// Rows are sorted by time and the last `lookback` are kept.
pub struct CsvSeriesFetcher {
    dir: PathBuf,
}

impl CsvSeriesFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", instrument))
    }

    fn parse(instrument: &str, content: &str) -> Result<Vec<PricePoint>, FetchError> {
        let invalid = |reason: String| FetchError::InvalidData {
            instrument: instrument.to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut points = Vec::new();
        for (line, record) in reader.deserialize::<CsvBar>().enumerate() {
            let bar = record.map_err(|e| invalid(format!("row {}: {}", line + 1, e)))?;
            let timestamp = parse_timestamp(&bar.timestamp).ok_or_else(|| {
                invalid(format!(
                    "row {}: unrecognized timestamp '{}'",
                    line + 1,
                    bar.timestamp
                ))
            })?;
            points.push(PricePoint::new(
                timestamp,
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume.unwrap_or(0.0),
            ));
        }
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

/// Epoch milliseconds, RFC 3339, or a bare date at midnight UTC
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn read_error(instrument: &str, path: &Path, e: std::io::Error) -> FetchError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FetchError::NotFound {
            instrument: instrument.to_string(),
        }
    } else {
        FetchError::Unavailable {
            instrument: instrument.to_string(),
            reason: format!("{}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl SeriesFetcher for CsvSeriesFetcher {
    async fn fetch_series(
        &self,
        instrument: &str,
        lookback: usize,
    ) -> Result<InstrumentSeries, FetchError> {
        let path = self.path_for(instrument);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| read_error(instrument, &path, e))?;

        let points = Self::parse(instrument, &content)?;
        debug!("Loaded {} rows from {}", points.len(), path.display());

        let series =
            InstrumentSeries::new(instrument, points).map_err(|e| FetchError::InvalidData {
                instrument: instrument.to_string(),
                reason: e.to_string(),
            })?;
        Ok(series.tail(lookback))
    }
}
