//! Momentum oscillators: RSI, MACD, Stochastic and Williams %R.

use serde::{Deserialize, Serialize};

use super::moving_average::{ema, rolling_max, rolling_min, sma};

/// Neutral RSI value used when the ratio is undefined.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Qualitative state of a bounded oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OscillatorLabel {
    Overbought,
    Oversold,
    Neutral,
}

impl OscillatorLabel {
    /// Classify `value` against the overbought/oversold thresholds.
    pub fn classify(value: f64, overbought: f64, oversold: f64) -> Self {
        if value > overbought {
            Self::Overbought
        } else if value < oversold {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }

    /// Contribution to the momentum score: oversold is bullish.
    pub fn score(&self) -> i32 {
        match self {
            Self::Overbought => -1,
            Self::Oversold => 1,
            Self::Neutral => 0,
        }
    }
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first `period` changes are averaged plainly; after that each average
/// is `(prev * (period - 1) + change) / period`. Positions where both
/// averages are zero (flat price or a single value) are filled with 50.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push(RSI_NEUTRAL);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if i <= period {
            // running mean while seeding
            let n = i as f64;
            avg_gain += (gain - avg_gain) / n;
            avg_loss += (loss - avg_loss) / n;
        } else {
            let p = period as f64;
            avg_gain = (avg_gain * (p - 1.0) + gain) / p;
            avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        }
        out.push(rsi_from_averages(avg_gain, avg_loss));
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { RSI_NEUTRAL };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast = ema(closes, fast);
    let slow = ema(closes, slow);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();
    Macd {
        macd: line,
        signal,
        histogram,
    }
}

/// Stochastic %K and its `d_period` SMA, %D.
#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic oscillator. A window with no range reads 50.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> Stochastic {
    let highest = rolling_max(highs, k_period);
    let lowest = rolling_min(lows, k_period);
    let k: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let range = highest[i] - lowest[i];
            if range > 0.0 {
                100.0 * (close - lowest[i]) / range
            } else {
                50.0
            }
        })
        .collect();
    let d = sma(&k, d_period);
    Stochastic { k, d }
}

/// Williams %R in `[-100, 0]`. A window with no range reads -50.
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let highest = rolling_max(highs, period);
    let lowest = rolling_min(lows, period);
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let range = highest[i] - lowest[i];
            if range > 0.0 {
                -100.0 * (highest[i] - close) / range
            } else {
                -50.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_rising_series_approaches_100() {
        let closes: Vec<f64> = (0..50).map(|i| 1.0 + i as f64 * 0.001).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[0], RSI_NEUTRAL);
        assert!(*out.last().unwrap() > 99.0);
    }

    #[test]
    fn test_rsi_falling_series_approaches_0() {
        let closes: Vec<f64> = (0..50).map(|i| 2.0 - i as f64 * 0.001).collect();
        let out = rsi(&closes, 14);
        assert!(*out.last().unwrap() < 1.0);
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        let out = rsi(&[1.1; 30], 14);
        assert!(out.iter().all(|v| *v == RSI_NEUTRAL));
    }

    #[test]
    fn test_rsi_mixed_series_in_range() {
        let closes = [1.0, 1.2, 1.1, 1.3, 1.25, 1.4, 1.35, 1.2, 1.3];
        let out = rsi(&closes, 3);
        assert!(out.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_macd_rising_series_bullish() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let m = macd(&closes, 12, 26, 9);
        let last = closes.len() - 1;
        assert!(m.macd[last] > 0.0);
        assert!(m.macd[last] > m.signal[last]);
        assert!((m.histogram[last] - (m.macd[last] - m.signal[last])).abs() < 1e-12);
    }

    #[test]
    fn test_stochastic_at_top_of_range() {
        let highs = [1.1, 1.2, 1.3];
        let lows = [1.0, 1.1, 1.2];
        let closes = [1.05, 1.15, 1.3];
        let s = stochastic(&highs, &lows, &closes, 14, 3);
        assert!((s.k[2] - 100.0).abs() < 1e-9);
        assert_eq!(s.k.len(), s.d.len());
    }

    #[test]
    fn test_zero_range_is_neutral() {
        let flat = [1.0; 5];
        let s = stochastic(&flat, &flat, &flat, 14, 3);
        assert!(s.k.iter().all(|v| *v == 50.0));
        let w = williams_r(&flat, &flat, &flat, 14);
        assert!(w.iter().all(|v| *v == -50.0));
    }

    #[test]
    fn test_williams_r_bounds() {
        let highs = [1.2, 1.3, 1.25];
        let lows = [1.0, 1.1, 1.05];
        let closes = [1.1, 1.3, 1.05];
        let w = williams_r(&highs, &lows, &closes, 14);
        assert!((w[1] - 0.0).abs() < 1e-9);
        assert!(w.iter().all(|v| (-100.0..=0.0).contains(v)));
    }

    #[test]
    fn test_oscillator_label() {
        assert_eq!(OscillatorLabel::classify(75.0, 70.0, 30.0), OscillatorLabel::Overbought);
        assert_eq!(OscillatorLabel::classify(25.0, 70.0, 30.0), OscillatorLabel::Oversold);
        assert_eq!(OscillatorLabel::classify(70.0, 70.0, 30.0), OscillatorLabel::Neutral);
        assert_eq!(OscillatorLabel::Oversold.score(), 1);
    }
}
