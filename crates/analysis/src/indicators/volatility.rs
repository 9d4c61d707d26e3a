//! Bollinger Bands and Average True Range.

use serde::{Deserialize, Serialize};

use super::moving_average::{rolling_std, sma};

/// Where the current price sits relative to the bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandPosition {
    Overbought,
    Oversold,
    Normal,
}

impl BandPosition {
    pub fn classify(price: f64, upper: f64, lower: f64) -> Self {
        if price > upper {
            Self::Overbought
        } else if price < lower {
            Self::Oversold
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// `SMA(period) ± k · stdev(period)`.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Bands {
    let middle = sma(closes, period);
    let std = rolling_std(closes, period);
    let upper = middle.iter().zip(&std).map(|(m, s)| m + k * s).collect();
    let lower = middle.iter().zip(&std).map(|(m, s)| m - k * s).collect();
    Bands {
        upper,
        middle,
        lower,
    }
}

/// True range per candle. The first candle has no previous close and uses
/// its high-low range.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                return hl;
            }
            let prev = closes[i - 1];
            hl.max((highs[i] - prev).abs()).max((lows[i] - prev).abs())
        })
        .collect()
}

/// Average True Range as a simple rolling mean of the true range.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    sma(&true_range(highs, lows, closes), period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_collapse_on_flat_series() {
        let bands = bollinger(&[1.5; 25], 20, 2.0);
        assert_eq!(bands.upper[24], 1.5);
        assert_eq!(bands.lower[24], 1.5);
        assert_eq!(
            BandPosition::classify(1.5, bands.upper[24], bands.lower[24]),
            BandPosition::Normal
        );
    }

    #[test]
    fn test_bands_order() {
        let closes: Vec<f64> = (0..30).map(|i| 1.0 + ((i % 5) as f64) * 0.01).collect();
        let bands = bollinger(&closes, 20, 2.0);
        for i in 0..closes.len() {
            assert!(bands.lower[i] <= bands.middle[i]);
            assert!(bands.middle[i] <= bands.upper[i]);
        }
    }

    #[test]
    fn test_true_range_uses_gaps() {
        let highs = [1.10, 1.30];
        let lows = [1.00, 1.25];
        let closes = [1.05, 1.28];
        let tr = true_range(&highs, &lows, &closes);
        assert!((tr[0] - 0.10).abs() < 1e-12);
        // gap up: high - previous close dominates
        assert!((tr[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_atr_constant_range() {
        let highs = [1.1; 20];
        let lows = [1.0; 20];
        let closes = [1.05; 20];
        let out = atr(&highs, &lows, &closes, 14);
        assert!((out[19] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_band_position() {
        assert_eq!(BandPosition::classify(2.0, 1.5, 1.0), BandPosition::Overbought);
        assert_eq!(BandPosition::classify(0.9, 1.5, 1.0), BandPosition::Oversold);
    }
}
