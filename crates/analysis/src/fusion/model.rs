//! Signal fusion domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::{pattern_score, OscillatorLabel, TrendDirection};
use crate::snapshot::IndicatorSnapshot;

/// Trade direction of a signal or signal component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
    /// Price sits on a historically important level; overrides the fused
    /// direction.
    SignificantLevel,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
            Self::Hold | Self::SignificantLevel => 0.0,
        }
    }

    /// Buy or Sell.
    pub fn is_directional(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::SignificantLevel => "SIGNIFICANT_LEVEL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technical contributors, each mapped onto `[-1, 1]` (positive is bullish).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalVector {
    pub trend: f64,
    pub macd: f64,
    pub rsi: f64,
    pub stochastic: f64,
    pub support_resistance: f64,
    pub patterns: f64,
    pub moving_averages: f64,
}

/// Support/resistance counts as "touched" within this distance, in percent.
const SR_PROXIMITY_PCT: f64 = 0.1;

impl TechnicalVector {
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Map snapshot readings to signed contributions. A snapshot flagged
    /// `insufficient_data` maps to the neutral vector.
    pub fn from_snapshot(snapshot: &IndicatorSnapshot) -> Self {
        if snapshot.insufficient_data {
            return Self::neutral();
        }

        let momentum = &snapshot.momentum;
        let macd = match momentum.macd.direction {
            TrendDirection::Bullish => 0.7,
            TrendDirection::Bearish => -0.7,
            TrendDirection::Neutral => 0.0,
        };
        let rsi = match momentum.rsi.label {
            OscillatorLabel::Oversold => 0.8,
            OscillatorLabel::Overbought => -0.8,
            OscillatorLabel::Neutral => (50.0 - momentum.rsi.value) / 50.0,
        };
        let stochastic = match momentum.stochastic.label {
            OscillatorLabel::Oversold => 0.6,
            OscillatorLabel::Overbought => -0.6,
            OscillatorLabel::Neutral => 0.0,
        };
        let support_resistance = match &snapshot.support_resistance {
            Some(sr) if sr.support_distance_pct() < SR_PROXIMITY_PCT => 0.7,
            Some(sr) if sr.resistance_distance_pct() < SR_PROXIMITY_PCT => -0.7,
            _ => 0.0,
        };

        Self {
            trend: (f64::from(snapshot.trend.score) / 3.0).clamp(-1.0, 1.0),
            macd,
            rsi: rsi.clamp(-1.0, 1.0),
            stochastic,
            support_resistance,
            patterns: pattern_score(&snapshot.patterns),
            moving_averages: snapshot.moving_averages.score(),
        }
    }
}

/// Output of the external fundamental analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundamentalVector {
    pub direction: Direction,
    /// 0-100.
    pub confidence: f64,
}

impl FundamentalVector {
    pub fn new(direction: Direction, confidence: f64) -> Self {
        let direction = if direction.is_directional() {
            direction
        } else {
            Direction::Hold
        };
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            direction,
            confidence,
        }
    }

    pub fn neutral() -> Self {
        Self::new(Direction::Hold, 0.0)
    }

    pub fn bullish(confidence: f64) -> Self {
        Self::new(Direction::Buy, confidence)
    }

    pub fn bearish(confidence: f64) -> Self {
        Self::new(Direction::Sell, confidence)
    }

    /// Build from a bias label such as `Bullish`, `Bearish` or `Neutral`.
    /// Unknown labels are neutral.
    pub fn from_bias(bias: &str, confidence: f64) -> Self {
        let direction = match bias.trim().to_ascii_lowercase().as_str() {
            "bullish" | "buy" => Direction::Buy,
            "bearish" | "sell" => Direction::Sell,
            _ => Direction::Hold,
        };
        Self::new(direction, confidence)
    }

    /// `confidence / 100` for Buy or Sell, 0 otherwise.
    pub fn strength(&self) -> f64 {
        if self.direction.is_directional() {
            self.confidence / 100.0
        } else {
            0.0
        }
    }
}

impl Default for FundamentalVector {
    fn default() -> Self {
        Self::neutral()
    }
}

/// One side (technical or fundamental) of a fused signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSignal {
    pub direction: Direction,
    /// `|raw_signal|`, 0-1.
    pub strength: f64,
    /// 0-100.
    pub confidence: f64,
    pub raw_signal: f64,
}

/// Result of [`SignalFusionEngine::fuse`](super::SignalFusionEngine::fuse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionOutcome {
    pub direction: Direction,
    /// Direction before the important-level override, when it fired.
    pub underlying_direction: Option<Direction>,
    pub confidence: f64,
    /// Confidence before the important-level override.
    pub computed_confidence: f64,
    pub strength: f64,
    /// `technical * w_t + fundamental * w_f`.
    pub raw_signal: f64,
    /// Both components point the same non-HOLD way.
    pub agreement: bool,
    pub technical: ComponentSignal,
    pub fundamental: ComponentSignal,
    pub note: Option<String>,
}

impl FusionOutcome {
    /// Direction used for stop and target placement.
    pub fn trading_direction(&self) -> Direction {
        self.underlying_direction.unwrap_or(self.direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    /// Annualized volatility of the trailing log returns, in percent.
    pub volatility: f64,
    pub atr: f64,
    pub risk_level: RiskLevel,
    /// Distance from entry to the stop.
    pub stop_distance: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: Option<f64>,
    pub take_profit_1: Option<f64>,
    pub take_profit_2: Option<f64>,
    /// Reward to the second target over the risk to the stop.
    pub risk_reward: Option<f64>,
    pub nearest_support: Option<f64>,
    pub nearest_resistance: Option<f64>,
    pub pivot: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizing {
    /// Percent of account.
    pub recommended_percent: f64,
    pub risk_level: RiskLevel,
    pub confidence_factor: f64,
    pub max_percent: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SignalQuality {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 80.0 {
            Self::Excellent
        } else if confidence >= 65.0 {
            Self::Good
        } else if confidence >= 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSummary {
    pub quality: SignalQuality,
    pub recommendation: String,
    pub risk_warning: Option<String>,
}

/// A complete trade signal for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub direction: Direction,
    pub underlying_direction: Option<Direction>,
    pub confidence: f64,
    pub strength: f64,
    pub raw_signal: f64,
    pub agreement: bool,
    pub technical: ComponentSignal,
    pub fundamental: ComponentSignal,
    pub risk: RiskMetrics,
    pub levels: TradeLevels,
    pub position: PositionSizing,
    pub summary: SignalSummary,
    pub note: Option<String>,
}

impl Signal {
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at < self.valid_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fundamental_vector_normalizes() {
        let v = FundamentalVector::new(Direction::SignificantLevel, 150.0);
        assert_eq!(v.direction, Direction::Hold);
        assert_eq!(v.confidence, 100.0);
        assert_eq!(v.strength(), 0.0);

        assert_eq!(FundamentalVector::new(Direction::Buy, f64::NAN).confidence, 0.0);
        assert_eq!(FundamentalVector::bearish(40.0).strength(), 0.4);
    }

    #[test]
    fn test_fundamental_from_bias() {
        assert_eq!(FundamentalVector::from_bias("Bullish", 60.0).direction, Direction::Buy);
        assert_eq!(FundamentalVector::from_bias(" BEARISH ", 60.0).direction, Direction::Sell);
        assert_eq!(FundamentalVector::from_bias("Unknown", 60.0).direction, Direction::Hold);
    }

    #[test]
    fn test_direction_serde() {
        let json = serde_json::to_string(&Direction::SignificantLevel).unwrap();
        assert_eq!(json, "\"SIGNIFICANT_LEVEL\"");
        assert_eq!(Direction::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_signal_quality_thresholds() {
        assert_eq!(SignalQuality::from_confidence(80.0), SignalQuality::Excellent);
        assert_eq!(SignalQuality::from_confidence(65.0), SignalQuality::Good);
        assert_eq!(SignalQuality::from_confidence(50.0), SignalQuality::Fair);
        assert_eq!(SignalQuality::from_confidence(49.9), SignalQuality::Poor);
    }
}
