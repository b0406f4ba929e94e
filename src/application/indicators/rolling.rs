//! Rolling-window helpers shared by the indicator engine and the detectors.
//!
//! Every helper returns one entry per input value. Entries before the first full
//! window are `None`.

use crate::domain::market::PricePoint;
use statrs::statistics::{Data, Distribution};
use ta::Next;
use ta::errors::TaError;
use ta::indicators::SimpleMovingAverage;

/// Relative tolerance under which a dispersion or average counts as zero
pub const ZERO_TOLERANCE: f64 = 1e-12;

/// Simple moving average over `window` values
///
/// # Arguments
/// * `values` - Input series
/// * `window` - Number of values per average (must be > 0)
///
/// # Returns
/// * `Ok(Vec<Option<f64>>)` - `None` for the first `window - 1` entries
/// * `Err(TaError)` - If `window` is zero
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, TaError> {
    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let mean = sma.next(v);
            (i + 1 >= window).then_some(mean)
        })
        .collect())
}

/// Sample standard deviation over `window` values.
///
/// Windows of a single value have no sample deviation and stay `None`.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_mean_std(values, window)
        .into_iter()
        .map(|stats| stats.map(|(_, std)| std))
        .collect()
}

/// Mean and sample standard deviation of each full window
pub fn rolling_mean_std(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    let mut out = vec![None; values.len()];
    if window < 2 || values.len() < window {
        return out;
    }

    for end in window..=values.len() {
        let data = Data::new(values[end - window..end].to_vec());
        if let (Some(mean), Some(std)) = (data.mean(), data.std_dev())
            && mean.is_finite()
            && std.is_finite()
        {
            out[end - 1] = Some((mean, std));
        }
    }
    out
}

/// True range per bar. The first bar has no previous close and uses `high - low`.
pub fn true_range(points: &[PricePoint]) -> Vec<f64> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let range = p.high - p.low;
            match i.checked_sub(1).map(|prev| points[prev].close) {
                Some(prev_close) => range
                    .max((p.high - prev_close).abs())
                    .max((p.low - prev_close).abs()),
                None => range,
            }
        })
        .collect()
}

/// True when `value` is indistinguishable from zero relative to `scale`
pub fn is_negligible(value: f64, scale: f64) -> bool {
    value.abs() <= ZERO_TOLERANCE * scale.abs().max(f64::MIN_POSITIVE)
}
