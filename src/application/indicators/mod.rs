//! Indicator Engine: RSI, MACD, Bollinger Bands and ATR over one series.

pub mod rolling;

use crate::domain::analytics::{IndicatorFrame, IndicatorRow};
use crate::domain::config::IndicatorSettings;
use crate::domain::errors::ComputationError;
use crate::domain::market::InstrumentSeries;
use rolling::{is_negligible, rolling_mean, rolling_std, true_range};
use ta::Next;
use ta::errors::TaError;
use ta::indicators::MovingAverageConvergenceDivergence;
use tracing::debug;

/// Compute every indicator for `series`. The frame has exactly one row per point.
///
/// Values inside an indicator's warm-up are `None`:
/// - RSI, Bollinger and ATR: first `window - 1` points
/// - MACD: first `macd_slow - 1` points
/// - MACD signal and histogram: first `macd_slow + macd_signal - 2` points
pub fn compute_indicators(
    series: &InstrumentSeries,
    settings: &IndicatorSettings,
) -> Result<IndicatorFrame, ComputationError> {
    let closes = series.closes();

    let rsi = compute_rsi(&closes, settings.rsi_window).map_err(ta_error("rsi"))?;
    let (macd, signal, histogram) = compute_macd(&closes, settings).map_err(ta_error("macd"))?;
    let (upper, mid, lower) =
        compute_bollinger(&closes, settings.bollinger_window, settings.bollinger_k)
            .map_err(ta_error("bollinger"))?;
    let atr = rolling_mean(&true_range(series.points()), settings.atr_window)
        .map_err(ta_error("atr"))?;

    let rows: Vec<IndicatorRow> = series
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| IndicatorRow {
            timestamp: p.timestamp,
            rsi: rsi[i],
            macd: macd[i],
            macd_signal: signal[i],
            macd_histogram: histogram[i],
            bollinger_upper: upper[i],
            bollinger_mid: mid[i],
            bollinger_lower: lower[i],
            atr: atr[i],
        })
        .collect();

    if let Some(row) = rows.iter().find(|r| !row_is_finite(r)) {
        return Err(ComputationError::Indicator {
            indicator: "frame",
            reason: format!("non-finite value at timestamp {}", row.timestamp),
        });
    }

    debug!(
        "Indicators for {}: {} rows",
        series.instrument(),
        rows.len()
    );
    Ok(IndicatorFrame::new(rows))
}

fn ta_error(indicator: &'static str) -> impl Fn(TaError) -> ComputationError {
    move |e| ComputationError::Indicator {
        indicator,
        reason: format!("{:?}", e),
    }
}

fn row_is_finite(row: &IndicatorRow) -> bool {
    [
        row.rsi,
        row.macd,
        row.macd_signal,
        row.macd_histogram,
        row.bollinger_upper,
        row.bollinger_mid,
        row.bollinger_lower,
        row.atr,
    ]
    .iter()
    .flatten()
    .all(|v| v.is_finite())
}

/// RSI from simple rolling means of gains and losses.
///
/// The change at the first point counts as zero. No movement in the window gives 50.
fn compute_rsi(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>, TaError> {
    let changes: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| if i == 0 { 0.0 } else { c - closes[i - 1] })
        .collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();

    let avg_gains = rolling_mean(&gains, window)?;
    let avg_losses = rolling_mean(&losses, window)?;

    Ok(avg_gains
        .into_iter()
        .zip(avg_losses)
        .zip(closes)
        .map(|((gain, loss), &close)| {
            let (gain, loss) = (gain?.max(0.0), loss?.max(0.0));
            // Running sums can leave residue once movement drops out of the window
            let gain_zero = is_negligible(gain, close);
            let loss_zero = is_negligible(loss, close);
            Some(match (gain_zero, loss_zero) {
                (true, true) => 50.0,
                (_, true) => 100.0,
                (true, false) => 0.0,
                (false, false) => 100.0 - 100.0 / (1.0 + gain / loss),
            })
        })
        .collect())
}

type MacdColumns = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

fn compute_macd(closes: &[f64], settings: &IndicatorSettings) -> Result<MacdColumns, TaError> {
    let mut macd = MovingAverageConvergenceDivergence::new(
        settings.macd_fast,
        settings.macd_slow,
        settings.macd_signal,
    )?;
    let macd_warmup = settings.macd_slow.saturating_sub(1);
    let signal_warmup = (settings.macd_slow + settings.macd_signal).saturating_sub(2);

    let mut line = Vec::with_capacity(closes.len());
    let mut signal = Vec::with_capacity(closes.len());
    let mut histogram = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        let out = macd.next(close);
        line.push((i >= macd_warmup).then_some(out.macd));
        signal.push((i >= signal_warmup).then_some(out.signal));
        histogram.push((i >= signal_warmup).then_some(out.histogram));
    }
    Ok((line, signal, histogram))
}

type BandColumns = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

fn compute_bollinger(closes: &[f64], window: usize, k: f64) -> Result<BandColumns, TaError> {
    let mids = rolling_mean(closes, window)?;
    let stds = rolling_std(closes, window);

    let mut upper = Vec::with_capacity(closes.len());
    let mut mid = Vec::with_capacity(closes.len());
    let mut lower = Vec::with_capacity(closes.len());
    for (m, s) in mids.into_iter().zip(stds) {
        match (m, s) {
            (Some(m), Some(s)) => {
                upper.push(Some(m + k * s));
                mid.push(Some(m));
                lower.push(Some(m - k * s));
            }
            _ => {
                upper.push(None);
                mid.push(None);
                lower.push(None);
            }
        }
    }
    Ok((upper, mid, lower))
}
