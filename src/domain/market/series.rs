use crate::domain::errors::SeriesError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One OHLCV bar. Timestamp is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar with open/high/low pinned to the close
    pub fn from_close(timestamp: i64, close: f64) -> Self {
        Self::new(timestamp, close, close, close, close, 0.0)
    }

    /// Typical price (HLC/3)
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// Ordered price history for one instrument, fixed for the duration of a refresh cycle.
///
/// # Invariants
///
/// - Timestamps strictly increase (unique, ascending). Gaps are allowed.
/// - Prices and volume are finite and non-negative, `low <= high`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSeries {
    instrument: String,
    points: Vec<PricePoint>,
}

impl InstrumentSeries {
    pub fn new(instrument: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        let series = Self {
            instrument: instrument.into(),
            points,
        };
        series.validate()?;
        Ok(series)
    }

    /// Build a series from closes spaced one day apart, starting at `start_ms`
    pub fn from_daily_closes(
        instrument: impl Into<String>,
        start_ms: i64,
        closes: &[f64],
    ) -> Result<Self, SeriesError> {
        const DAY_MS: i64 = 86_400_000;
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::from_close(start_ms + i as i64 * DAY_MS, close))
            .collect();
        Self::new(instrument, points)
    }

    fn validate(&self) -> Result<(), SeriesError> {
        for (index, point) in self.points.iter().enumerate() {
            let fields = [
                ("open", point.open),
                ("high", point.high),
                ("low", point.low),
                ("close", point.close),
                ("volume", point.volume),
            ];
            for (field, value) in fields {
                if !value.is_finite() || value < 0.0 {
                    return Err(SeriesError::InvalidValue { index, field });
                }
            }

            if point.low > point.high {
                return Err(SeriesError::InvertedRange {
                    index,
                    low: point.low,
                    high: point.high,
                });
            }

            if index > 0 {
                let previous = self.points[index - 1].timestamp;
                if point.timestamp <= previous {
                    return Err(SeriesError::NonMonotonic {
                        index,
                        previous,
                        current: point.timestamp,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn contains_timestamp(&self, timestamp: i64) -> bool {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .is_ok()
    }

    /// Keep only the most recent `n` points
    pub fn tail(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            instrument: self.instrument.clone(),
            points: self.points[start..].to_vec(),
        }
    }

    /// Median spacing between consecutive timestamps, in milliseconds.
    ///
    /// Returns `None` for series with fewer than two points.
    pub fn median_step_ms(&self) -> Option<i64> {
        if self.points.len() < 2 {
            return None;
        }
        let mut steps: Vec<i64> = self
            .points
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .collect();
        steps.sort_unstable();
        Some(steps[steps.len() / 2])
    }

    /// SHA-256 digest over the instrument and every point, hex encoded.
    ///
    /// Two snapshots with the same content share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.instrument.as_bytes());
        for p in &self.points {
            hasher.update(p.timestamp.to_le_bytes());
            for value in [p.open, p.high, p.low, p.close, p.volume] {
                hasher.update(value.to_bits().to_le_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}
