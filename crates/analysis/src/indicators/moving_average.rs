//! Moving averages and rolling window statistics.
//!
//! Every function returns one value per input value. Windows shorter than
//! `period` at the start of the series use whatever values are available
//! (a minimum of one observation), so the outputs never contain gaps.

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        let n = (i + 1).min(period);
        out.push(sum / n as f64);
    }
    out
}

/// Exponential moving average with `alpha = 2 / (period + 1)`, seeded with
/// the first value and no bias adjustment.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(p) => alpha * value + (1.0 - alpha) * p,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Sample standard deviation over a trailing window. Windows holding a
/// single value yield 0.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    (0..values.len())
        .map(|i| {
            let window = &values[(i + 1).saturating_sub(period)..=i];
            sample_std(window)
        })
        .collect()
}

/// Highest value over a trailing window.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, f64::max, f64::NEG_INFINITY)
}

/// Lowest value over a trailing window.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, f64::min, f64::INFINITY)
}

fn rolling(values: &[f64], period: usize, pick: fn(f64, f64) -> f64, init: f64) -> Vec<f64> {
    let period = period.max(1);
    (0..values.len())
        .map(|i| {
            values[(i + 1).saturating_sub(period)..=i]
                .iter()
                .copied()
                .fold(init, pick)
        })
        .collect()
}

pub(crate) fn sample_std(window: &[f64]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Population standard deviation.
pub(crate) fn population_std(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    (window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Last element, or `default` for an empty slice.
pub(crate) fn last_or(values: &[f64], default: f64) -> f64 {
    values.last().copied().unwrap_or(default)
}
