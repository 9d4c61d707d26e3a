//! Indicator primitives.
//!
//! Plain functions over `&[f64]` / `&[Candle]` slices, one output value per
//! input value where the indicator is a series:
//! - `moving_average` - SMA, EMA and rolling window statistics
//! - `momentum` - RSI, MACD, Stochastic, Williams %R
//! - `volatility` - Bollinger Bands, true range, ATR
//! - `volume` - current vs. average volume
//! - `levels` - support/resistance and important price levels
//! - `patterns` - candlestick patterns

pub mod levels;
pub mod momentum;
pub mod moving_average;
pub mod patterns;
pub mod volatility;
pub mod volume;

use serde::{Deserialize, Serialize};

pub use levels::{important_levels, is_at_important_level, support_resistance, SupportResistance};
pub use momentum::{macd, rsi, stochastic, williams_r, OscillatorLabel};
pub use moving_average::{ema, rolling_max, rolling_min, rolling_std, sma};
pub use patterns::{detect_patterns, pattern_score, CandlePattern, DetectedPattern, PatternBias};
pub use volatility::{atr, bollinger, true_range, BandPosition};
pub use volume::{volume_ratio, VolumeLabel};

/// Direction of a trend or crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendDirection {
    /// Majority vote: `>= 2` bullish, `<= -2` bearish.
    pub fn from_score(score: i32) -> Self {
        if score >= 2 {
            Self::Bullish
        } else if score <= -2 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            Self::Bullish => 1.0,
            Self::Bearish => -1.0,
            Self::Neutral => 0.0,
        }
    }
}
