//! Candlestick pattern detection on the trailing candles.

use fxpulse_market_data::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandlePattern {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    ShootingStar,
    Doji,
}

impl CandlePattern {
    pub fn bias(&self) -> PatternBias {
        match self {
            Self::BullishEngulfing | Self::Hammer => PatternBias::Bullish,
            Self::BearishEngulfing | Self::ShootingStar => PatternBias::Bearish,
            Self::Doji => PatternBias::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternBias {
    Bullish,
    Bearish,
    Neutral,
}

impl PatternBias {
    /// Signed contribution used by signal fusion.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Bullish => 0.5,
            Self::Bearish => -0.5,
            Self::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern: CandlePattern,
    pub bias: PatternBias,
}

impl From<CandlePattern> for DetectedPattern {
    fn from(pattern: CandlePattern) -> Self {
        Self {
            pattern,
            bias: pattern.bias(),
        }
    }
}

/// Body no larger than this fraction of the range is a doji.
const DOJI_BODY_RATIO: f64 = 0.1;
/// Hammer / shooting star: long shadow at least this multiple of the body.
const SHADOW_TO_BODY: f64 = 2.0;
/// Hammer / shooting star: opposite shadow at most this fraction of the range.
const SHORT_SHADOW_RATIO: f64 = 0.15;

/// Detect patterns formed by the last one or two candles.
pub fn detect_patterns(candles: &[Candle]) -> Vec<DetectedPattern> {
    let mut found = Vec::new();
    let Some(last) = candles.last() else {
        return found;
    };

    if let Some(prev) = candles.len().checked_sub(2).map(|i| &candles[i]) {
        if is_bullish_engulfing(prev, last) {
            found.push(CandlePattern::BullishEngulfing.into());
        } else if is_bearish_engulfing(prev, last) {
            found.push(CandlePattern::BearishEngulfing.into());
        }
    }

    let range = last.range();
    if range <= 0.0 {
        return found;
    }
    let body = last.body();
    let upper = last.high - last.open.max(last.close);
    let lower = last.open.min(last.close) - last.low;

    if body <= DOJI_BODY_RATIO * range {
        found.push(CandlePattern::Doji.into());
    } else if lower >= SHADOW_TO_BODY * body && upper <= SHORT_SHADOW_RATIO * range {
        found.push(CandlePattern::Hammer.into());
    } else if upper >= SHADOW_TO_BODY * body && lower <= SHORT_SHADOW_RATIO * range {
        found.push(CandlePattern::ShootingStar.into());
    }

    found
}

fn is_bullish_engulfing(prev: &Candle, last: &Candle) -> bool {
    prev.is_bearish()
        && last.is_bullish()
        && last.open <= prev.close
        && last.close >= prev.open
        && last.body() > prev.body()
}

fn is_bearish_engulfing(prev: &Candle, last: &Candle) -> bool {
    prev.is_bullish()
        && last.is_bearish()
        && last.open >= prev.close
        && last.close <= prev.open
        && last.body() > prev.body()
}

/// Net pattern score in `[-1, 1]`: +0.5 per bullish, -0.5 per bearish.
pub fn pattern_score(patterns: &[DetectedPattern]) -> f64 {
    patterns
        .iter()
        .map(|p| p.bias.weight())
        .sum::<f64>()
        .clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            0.0,
        )
    }

    fn kinds(found: &[DetectedPattern]) -> Vec<CandlePattern> {
        found.iter().map(|p| p.pattern).collect()
    }

    #[test]
    fn test_bullish_engulfing() {
        let prev = candle(1.10, 1.105, 1.09, 1.095);
        let last = candle(1.094, 1.115, 1.093, 1.112);
        let found = detect_patterns(&[prev, last]);
        assert_eq!(kinds(&found), vec![CandlePattern::BullishEngulfing]);
        assert_eq!(pattern_score(&found), 0.5);
    }

    #[test]
    fn test_bearish_engulfing() {
        let prev = candle(1.095, 1.105, 1.09, 1.10);
        let last = candle(1.102, 1.103, 1.085, 1.088);
        let found = detect_patterns(&[prev, last]);
        assert_eq!(kinds(&found), vec![CandlePattern::BearishEngulfing]);
        assert_eq!(pattern_score(&found), -0.5);
    }

    #[test]
    fn test_hammer() {
        // small body at the top, long lower shadow
        let found = detect_patterns(&[candle(1.098, 1.1012, 1.090, 1.1010)]);
        assert_eq!(kinds(&found), vec![CandlePattern::Hammer]);
        assert_eq!(found[0].bias, PatternBias::Bullish);
    }

    #[test]
    fn test_shooting_star() {
        let found = detect_patterns(&[candle(1.1030, 1.110, 1.0995, 1.100)]);
        assert_eq!(kinds(&found), vec![CandlePattern::ShootingStar]);
    }

    #[test]
    fn test_doji() {
        let found = detect_patterns(&[candle(1.1000, 1.105, 1.095, 1.1002)]);
        assert_eq!(kinds(&found), vec![CandlePattern::Doji]);
        assert_eq!(pattern_score(&found), 0.0);
    }

    #[test]
    fn test_plain_candle_and_empty() {
        assert!(detect_patterns(&[]).is_empty());
        assert!(detect_patterns(&[candle(1.0, 1.1, 0.99, 1.09)]).is_empty());
    }
}
