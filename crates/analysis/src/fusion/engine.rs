use std::time::Duration;

use chrono::{DateTime, Utc};
use fxpulse_market_data::{Pair, Series};
use log::debug;
use serde::{Deserialize, Serialize};

use super::model::{
    ComponentSignal, Direction, FundamentalVector, FusionOutcome, Signal, TechnicalVector,
};
use super::risk::{
    default_risk_metrics, default_trade_levels, position_size, risk_metrics, summarize,
    trade_levels, RiskConfig,
};
use crate::snapshot::IndicatorSnapshot;

/// Weights of the technical contributors. Momentum is split across MACD,
/// RSI and Stochastic by the `*_share` fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TechnicalWeights {
    pub trend: f64,
    pub momentum: f64,
    pub macd_share: f64,
    pub rsi_share: f64,
    pub stochastic_share: f64,
    pub support_resistance: f64,
    pub patterns: f64,
    pub moving_averages: f64,
}

impl Default for TechnicalWeights {
    fn default() -> Self {
        Self {
            trend: 0.3,
            momentum: 0.2,
            macd_share: 0.4,
            rsi_share: 0.35,
            stochastic_share: 0.25,
            support_resistance: 0.15,
            patterns: 0.15,
            moving_averages: 0.15,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FusionConfig {
    pub technical_weight: f64,
    pub fundamental_weight: f64,
    /// |technical scalar| above which the technical side is directional.
    pub technical_threshold: f64,
    /// |combined scalar| above which the signal is BUY or SELL.
    pub combined_threshold: f64,
    /// Added to the confidence when both sides agree on BUY or SELL.
    pub agreement_bonus: f64,
    pub significant_level_confidence: f64,
    #[serde(with = "duration_secs")]
    pub validity: Duration,
    pub weights: TechnicalWeights,
    pub risk: RiskConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            technical_weight: 0.6,
            fundamental_weight: 0.4,
            technical_threshold: 0.1,
            combined_threshold: 0.15,
            agreement_bonus: 20.0,
            significant_level_confidence: 90.0,
            validity: Duration::from_secs(3_600),
            weights: TechnicalWeights::default(),
            risk: RiskConfig::default(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Blends technical and fundamental views into a [`Signal`].
///
/// Stateless apart from its configuration; safe to share across threads.
#[derive(Clone, Debug, Default)]
pub struct SignalFusionEngine {
    config: FusionConfig,
}

impl SignalFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Weighted average of the technical contributors.
    pub fn technical_signal(&self, vector: &TechnicalVector) -> ComponentSignal {
        let w = &self.config.weights;
        let parts = [
            (vector.trend, w.trend),
            (vector.macd, w.momentum * w.macd_share),
            (vector.rsi, w.momentum * w.rsi_share),
            (vector.stochastic, w.momentum * w.stochastic_share),
            (vector.support_resistance, w.support_resistance),
            (vector.patterns, w.patterns),
            (vector.moving_averages, w.moving_averages),
        ];
        let total: f64 = parts.iter().map(|(_, weight)| weight).sum();
        let raw = if total > 0.0 {
            parts.iter().map(|(s, weight)| s * weight).sum::<f64>() / total
        } else {
            0.0
        };
        let raw = if raw.is_finite() { raw.clamp(-1.0, 1.0) } else { 0.0 };

        let threshold = self.config.technical_threshold;
        let direction = if raw > threshold {
            Direction::Buy
        } else if raw < -threshold {
            Direction::Sell
        } else {
            Direction::Hold
        };

        ComponentSignal {
            direction,
            strength: raw.abs(),
            confidence: (raw.abs() * 100.0).min(100.0),
            raw_signal: raw,
        }
    }

    pub fn fundamental_signal(&self, vector: &FundamentalVector) -> ComponentSignal {
        let strength = vector.strength();
        ComponentSignal {
            direction: vector.direction,
            strength,
            confidence: vector.confidence,
            raw_signal: vector.direction.sign() * strength,
        }
    }

    /// Combine both sides. When `at_important_level` is set the result is
    /// SIGNIFICANT_LEVEL at the configured fixed confidence, with the
    /// computed direction kept in `underlying_direction`.
    pub fn fuse(
        &self,
        technical: &TechnicalVector,
        fundamental: &FundamentalVector,
        at_important_level: bool,
    ) -> FusionOutcome {
        let cfg = &self.config;
        let tech = self.technical_signal(technical);
        let fund = self.fundamental_signal(fundamental);

        let raw = tech.direction.sign() * tech.strength * cfg.technical_weight
            + fund.direction.sign() * fund.strength * cfg.fundamental_weight;
        let direction = if raw > cfg.combined_threshold {
            Direction::Buy
        } else if raw < -cfg.combined_threshold {
            Direction::Sell
        } else {
            Direction::Hold
        };

        let agreement = tech.direction.is_directional() && tech.direction == fund.direction;
        let mut confidence =
            tech.confidence * cfg.technical_weight + fund.confidence * cfg.fundamental_weight;
        if agreement {
            // agreement never lowers confidence below either side alone
            confidence = (confidence + cfg.agreement_bonus)
                .max(tech.confidence)
                .max(fund.confidence);
        }
        let confidence = confidence.clamp(0.0, 100.0);

        let mut outcome = FusionOutcome {
            direction,
            underlying_direction: None,
            confidence,
            computed_confidence: confidence,
            strength: raw.abs(),
            raw_signal: raw,
            agreement,
            technical: tech,
            fundamental: fund,
            note: None,
        };

        if at_important_level {
            outcome.underlying_direction = Some(direction);
            outcome.direction = Direction::SignificantLevel;
            outcome.confidence = cfg.significant_level_confidence.clamp(0.0, 100.0);
            outcome.note = Some(
                "Current price matches a historically important price action point.".to_string(),
            );
        }

        outcome
    }

    /// Full signal for `pair`, valid for the configured period from now.
    pub fn generate(
        &self,
        pair: &Pair,
        series: &Series,
        snapshot: &IndicatorSnapshot,
        fundamental: &FundamentalVector,
    ) -> Signal {
        self.generate_at(pair, series, snapshot, fundamental, Utc::now())
    }

    pub fn generate_at(
        &self,
        pair: &Pair,
        series: &Series,
        snapshot: &IndicatorSnapshot,
        fundamental: &FundamentalVector,
        now: DateTime<Utc>,
    ) -> Signal {
        let cfg = &self.config;
        let technical = TechnicalVector::from_snapshot(snapshot);
        let at_level = snapshot.at_important_level && !snapshot.important_levels.is_empty();
        let outcome = self.fuse(&technical, fundamental, at_level);

        let closes: Vec<f64> = series
            .candles
            .iter()
            .map(|c| c.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();
        let atr = snapshot.volatility.atr;
        let decimals = pair
            .profile()
            .map_or(cfg.risk.price_decimals, |profile| profile.decimals);
        let (risk, levels) = match closes.last() {
            Some(&price) => (
                risk_metrics(&closes, atr, &cfg.risk),
                trade_levels(
                    price,
                    atr,
                    outcome.trading_direction(),
                    snapshot.support_resistance.as_ref(),
                    decimals,
                    &cfg.risk,
                ),
            ),
            None => (default_risk_metrics(), default_trade_levels()),
        };

        // sized on the computed confidence so the level override cannot inflate it
        let position = position_size(risk.risk_level, outcome.computed_confidence, &cfg.risk);
        let summary = summarize(outcome.direction, outcome.confidence, risk.risk_level);

        debug!(
            "{}: {} conf={:.1} raw={:.3} risk={}",
            pair.symbol, outcome.direction, outcome.confidence, outcome.raw_signal, risk.risk_level
        );

        let validity = chrono::Duration::from_std(cfg.validity)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        Signal {
            symbol: pair.symbol.to_string(),
            timestamp: now,
            valid_until: now + validity,
            direction: outcome.direction,
            underlying_direction: outcome.underlying_direction,
            confidence: outcome.confidence,
            strength: outcome.strength,
            raw_signal: outcome.raw_signal,
            agreement: outcome.agreement,
            technical: outcome.technical,
            fundamental: outcome.fundamental,
            risk,
            levels,
            position,
            summary,
            note: outcome.note,
        }
    }
}
