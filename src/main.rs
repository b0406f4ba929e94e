//! Stock anomaly monitor
//!
//! Refreshes indicators, forecasts and anomaly events for a watchlist on a fixed
//! interval. Alerts are written to the log; a JSON cycle snapshot goes to stdout.
//!
//! # Usage
//! ```sh
//! STOCK_TICKERS=AAPL,MSFT stock-anomaly --interval-minutes 5
//! stock-anomaly --once --symbols TSLA
//! ```

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use stock_anomaly::application::system::Application;
use stock_anomaly::config::{Config, parse_tickers};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "stock-anomaly", version, about = "Stock price anomaly monitor")]
struct Args {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Comma-separated tickers, overrides STOCK_TICKERS
    #[arg(long)]
    symbols: Option<String>,

    /// Minutes between refresh cycles, overrides FETCH_INTERVAL_MINUTES
    #[arg(long)]
    interval_minutes: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).pretty())
        .init();

    info!("Stock anomaly monitor {} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(symbols) = &args.symbols {
        let tickers = parse_tickers(symbols);
        if tickers.is_empty() {
            anyhow::bail!("--symbols must name at least one instrument");
        }
        config.runtime.tickers = tickers;
    }
    if let Some(minutes) = args.interval_minutes {
        if minutes == 0 {
            anyhow::bail!("--interval-minutes must be > 0");
        }
        config.runtime.fetch_interval_minutes = minutes;
    }

    info!(
        "Configuration loaded: Source={:?}, Tickers={:?}, Interval={}min",
        config.runtime.data_source, config.runtime.tickers, config.runtime.fetch_interval_minutes
    );

    let app = Application::build(config).await?;

    if args.once {
        let result = app.run_once().await;
        info!(
            "Cycle finished: {} completed, {} failed, {} events",
            result.completed_count(),
            result.failed_count(),
            result.total_events()
        );
        for report in result.failed() {
            if let Some(reason) = report.failure() {
                warn!("{} failed: {}", report.instrument, reason);
            }
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Stopping...");
        }
        signal_token.cancel();
    });

    info!(
        "Monitoring every {:?}. Press Ctrl+C to shutdown.",
        Duration::from_secs(app.config().runtime.fetch_interval_minutes * 60)
    );
    app.run(shutdown).await;

    Ok(())
}
