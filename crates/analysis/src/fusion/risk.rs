//! Risk tier, stop/target placement, position sizing and summary text.

use serde::{Deserialize, Serialize};

use super::model::{
    Direction, PositionSizing, RiskLevel, RiskMetrics, SignalQuality, SignalSummary, TradeLevels,
};
use crate::indicators::moving_average::population_std;
use crate::indicators::SupportResistance;

const TRADING_DAYS: f64 = 252.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskConfig {
    /// Trailing log returns used for volatility.
    pub volatility_window: usize,
    /// Annualized volatility (%) above which risk is High.
    pub high_volatility: f64,
    /// Annualized volatility (%) above which risk is Medium.
    pub medium_volatility: f64,
    pub stop_atr_multiple: f64,
    pub first_target_atr_multiple: f64,
    pub second_target_atr_multiple: f64,
    /// ATR substitute as a fraction of price when ATR is unavailable.
    pub fallback_atr_fraction: f64,
    pub low_risk_position: f64,
    pub medium_risk_position: f64,
    pub high_risk_position: f64,
    pub max_position: f64,
    /// Decimal places for price levels of pairs outside the catalog.
    pub price_decimals: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            volatility_window: 20,
            high_volatility: 15.0,
            medium_volatility: 8.0,
            stop_atr_multiple: 2.0,
            first_target_atr_multiple: 2.0,
            second_target_atr_multiple: 4.0,
            fallback_atr_fraction: 0.01,
            low_risk_position: 2.0,
            medium_risk_position: 1.5,
            high_risk_position: 1.0,
            max_position: 3.0,
            price_decimals: 5,
        }
    }
}

/// Risk metrics used when there is no usable price history.
pub fn default_risk_metrics() -> RiskMetrics {
    RiskMetrics {
        volatility: 1.5,
        atr: 0.0,
        risk_level: RiskLevel::Medium,
        stop_distance: 0.005,
        current_price: 1.0,
    }
}

/// Levels used when there is no usable price history.
pub fn default_trade_levels() -> TradeLevels {
    TradeLevels {
        entry: 1.0,
        stop_loss: Some(0.995),
        take_profit_1: Some(1.005),
        take_profit_2: Some(1.01),
        risk_reward: Some(2.0),
        nearest_support: None,
        nearest_resistance: None,
        pivot: None,
    }
}

/// ATR, or a fraction of price when the ATR is missing.
pub fn effective_atr(atr: f64, price: f64, config: &RiskConfig) -> f64 {
    if atr.is_finite() && atr > 0.0 {
        atr
    } else {
        price * config.fallback_atr_fraction
    }
}

/// Annualized volatility of the trailing log returns and the resulting tier.
pub fn risk_metrics(closes: &[f64], atr: f64, config: &RiskConfig) -> RiskMetrics {
    let usable: Vec<f64> = closes
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    let Some(&price) = usable.last() else {
        return default_risk_metrics();
    };
    if usable.len() < 2 {
        return RiskMetrics {
            current_price: price,
            ..default_risk_metrics()
        };
    }

    let returns: Vec<f64> = usable.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let tail = &returns[returns.len().saturating_sub(config.volatility_window.max(1))..];
    let volatility = population_std(tail) * TRADING_DAYS.sqrt() * 100.0;

    let risk_level = if volatility > config.high_volatility {
        RiskLevel::High
    } else if volatility > config.medium_volatility {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskMetrics {
        volatility,
        atr,
        risk_level,
        stop_distance: effective_atr(atr, price, config) * config.stop_atr_multiple,
        current_price: price,
    }
}

/// Entry, stop and two targets at ATR multiples from `price`, rounded to
/// `decimals`. Sell signals mirror Buy signals; anything else only gets an
/// entry.
pub fn trade_levels(
    price: f64,
    atr: f64,
    direction: Direction,
    sr: Option<&SupportResistance>,
    decimals: u32,
    config: &RiskConfig,
) -> TradeLevels {
    let atr = effective_atr(atr, price, config);
    let sign = direction.sign();
    let round = |v: f64| round_to(v, decimals);

    let (stop_loss, tp1, tp2, risk_reward) = if direction.is_directional() {
        let stop = price - sign * atr * config.stop_atr_multiple;
        let tp1 = price + sign * atr * config.first_target_atr_multiple;
        let tp2 = price + sign * atr * config.second_target_atr_multiple;
        let risk = (price - stop).abs();
        let rr = (risk > 0.0).then(|| ((tp2 - price).abs() / risk * 100.0).round() / 100.0);
        (Some(round(stop)), Some(round(tp1)), Some(round(tp2)), rr)
    } else {
        (None, None, None, None)
    };

    TradeLevels {
        entry: round(price),
        stop_loss,
        take_profit_1: tp1,
        take_profit_2: tp2,
        risk_reward,
        nearest_support: sr.map(|s| round(s.nearest_support)),
        nearest_resistance: sr.map(|s| round(s.nearest_resistance)),
        pivot: sr.map(|s| round(s.pivot)),
    }
}

/// Base size for the risk tier scaled by `confidence / 100`, capped.
pub fn position_size(
    risk_level: RiskLevel,
    confidence: f64,
    config: &RiskConfig,
) -> PositionSizing {
    let base = match risk_level {
        RiskLevel::Low => config.low_risk_position,
        RiskLevel::Medium => config.medium_risk_position,
        RiskLevel::High => config.high_risk_position,
    };
    let factor = (confidence / 100.0).clamp(0.0, 1.0);
    let recommended = (base * factor).min(config.max_position);

    PositionSizing {
        recommended_percent: round_to(recommended, 2),
        risk_level,
        confidence_factor: round_to(factor, 2),
        max_percent: config.max_position,
        notes: format!(
            "Based on {} risk and {:.0}% confidence",
            risk_level.as_str().to_lowercase(),
            confidence
        ),
    }
}

pub fn summarize(direction: Direction, confidence: f64, risk_level: RiskLevel) -> SignalSummary {
    let recommendation = match direction {
        Direction::Hold => "No clear trading opportunity. Wait for better setup.".to_string(),
        Direction::SignificantLevel => {
            "Price is at a historically important level. Watch for a breakout or reversal."
                .to_string()
        }
        d if confidence < 50.0 => format!("Weak {} signal. Consider waiting for confirmation.", d),
        d if confidence < 70.0 => format!("Moderate {} signal. Use smaller position size.", d),
        d => format!("Strong {} signal with good risk/reward potential.", d),
    };
    let risk_warning = match risk_level {
        RiskLevel::High => {
            Some("High volatility detected. Use appropriate risk management.".to_string())
        }
        RiskLevel::Medium => Some("Moderate volatility. Monitor position closely.".to_string()),
        RiskLevel::Low => None,
    };

    SignalSummary {
        quality: SignalQuality::from_confidence(confidence),
        recommendation,
        risk_warning,
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
