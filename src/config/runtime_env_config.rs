//! Runtime configuration parsing from environment variables.
//!
//! Instruments, refresh cadence, data source, storage and alert delivery.

use super::{Lookup, parse_u64, parse_usize};
use anyhow::{Result, bail};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TICKERS: &str = "AAPL,GOOGL,MSFT,TSLA";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/stock_anomalies.db";

/// Where price series come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Mock,
    Csv,
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(DataSource::Mock),
            "csv" => Ok(DataSource::Csv),
            _ => bail!("Invalid DATA_SOURCE: {}. Must be 'mock' or 'csv'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeEnvConfig {
    pub tickers: Vec<String>,
    pub fetch_interval_minutes: u64,
    pub lookback_bars: usize,
    /// 0 means one worker per available core
    pub max_concurrency: usize,
    pub data_source: DataSource,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub alert_throttle_minutes: u64,
    pub confirmation_min_methods: usize,
}

impl RuntimeEnvConfig {
    pub fn from_lookup(lookup: &Lookup) -> Result<Self> {
        let tickers = parse_tickers(
            &lookup("STOCK_TICKERS").unwrap_or_else(|| DEFAULT_TICKERS.to_string()),
        );
        if tickers.is_empty() {
            bail!("STOCK_TICKERS must name at least one instrument");
        }

        let fetch_interval_minutes = parse_u64(lookup, "FETCH_INTERVAL_MINUTES", 5)?;
        if fetch_interval_minutes == 0 {
            bail!("FETCH_INTERVAL_MINUTES must be > 0");
        }

        let data_source = lookup("DATA_SOURCE")
            .unwrap_or_else(|| "mock".to_string())
            .parse::<DataSource>()?;

        Ok(Self {
            tickers,
            fetch_interval_minutes,
            lookback_bars: parse_usize(lookup, "LOOKBACK_BARS", 180)?,
            max_concurrency: parse_usize(lookup, "MAX_CONCURRENCY", 0)?,
            data_source,
            data_dir: PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            alert_throttle_minutes: parse_u64(lookup, "ALERT_THROTTLE_MINUTES", 15)?,
            confirmation_min_methods: parse_usize(lookup, "CONFIRMATION_MIN_METHODS", 2)?,
        })
    }
}

/// Upper-cased, trimmed, first occurrence kept
pub fn parse_tickers(raw: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}
