//! Indicator snapshot: every technical reading for one series at its last
//! candle, plus the [`TechnicalAnalyzer`] that computes it.

use chrono::{DateTime, Utc};
use fxpulse_market_data::{Candle, Series, Timeframe};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{AnalysisError, Result};
use crate::indicators::moving_average::last_or;
use crate::indicators::{
    atr, bollinger, detect_patterns, ema, important_levels, is_at_important_level, macd, rsi,
    sma, stochastic, support_resistance, volume_ratio, williams_r, BandPosition, DetectedPattern,
    OscillatorLabel, SupportResistance, TrendDirection, VolumeLabel,
};

/// Indicator periods and thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndicatorConfig {
    /// Below this many usable candles the snapshot is neutral.
    pub min_candles: usize,
    pub sma_short: usize,
    pub sma_long: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub stochastic_k: usize,
    pub stochastic_d: usize,
    pub stochastic_overbought: f64,
    pub stochastic_oversold: f64,
    pub williams_period: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub atr_period: usize,
    pub volume_period: usize,
    /// Candles over which trend strength is measured.
    pub trend_lookback: usize,
    /// Candles on each side of a support/resistance pivot.
    pub pivot_span: usize,
    pub max_sr_levels: usize,
    pub sr_fallback_window: usize,
    /// Centered window for important levels.
    pub level_window: usize,
    /// Relative distance that counts as "at" an important level.
    pub level_tolerance: f64,
    pub level_lookback_years: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            min_candles: 20,
            sma_short: 20,
            sma_long: 50,
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            stochastic_k: 14,
            stochastic_d: 3,
            stochastic_overbought: 80.0,
            stochastic_oversold: 20.0,
            williams_period: 14,
            bollinger_period: 20,
            bollinger_k: 2.0,
            atr_period: 14,
            volume_period: 20,
            trend_lookback: 20,
            pivot_span: 2,
            max_sr_levels: 3,
            sr_fallback_window: 20,
            level_window: 30,
            level_tolerance: 0.001,
            level_lookback_years: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReading {
    pub direction: TrendDirection,
    /// `min(|% change over the lookback| * 10, 100)`.
    pub strength: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    /// Sum of the three +1/-1 votes.
    pub score: i32,
}

impl Default for TrendReading {
    fn default() -> Self {
        Self {
            direction: TrendDirection::Neutral,
            strength: 0.0,
            sma_short: 0.0,
            sma_long: 0.0,
            ema_fast: 0.0,
            ema_slow: 0.0,
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscillatorReading {
    pub value: f64,
    pub label: OscillatorLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StochasticReading {
    pub k: f64,
    pub d: f64,
    pub label: OscillatorLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentumReading {
    pub rsi: OscillatorReading,
    pub macd: MacdReading,
    pub stochastic: StochasticReading,
    pub williams_r: OscillatorReading,
    /// RSI, MACD and Stochastic contributions, each in `{-1, 0, 1}`.
    pub score: i32,
}

impl Default for MomentumReading {
    fn default() -> Self {
        Self {
            rsi: OscillatorReading {
                value: 50.0,
                label: OscillatorLabel::Neutral,
            },
            macd: MacdReading {
                macd: 0.0,
                signal: 0.0,
                histogram: 0.0,
                direction: TrendDirection::Neutral,
            },
            stochastic: StochasticReading {
                k: 50.0,
                d: 50.0,
                label: OscillatorLabel::Neutral,
            },
            williams_r: OscillatorReading {
                value: -50.0,
                label: OscillatorLabel::Neutral,
            },
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: BandPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityReading {
    pub bollinger: BollingerReading,
    pub atr: f64,
    /// ATR as a percentage of the last price.
    pub volatility_percent: f64,
}

impl Default for VolatilityReading {
    fn default() -> Self {
        Self {
            bollinger: BollingerReading {
                upper: 0.0,
                middle: 0.0,
                lower: 0.0,
                position: BandPosition::Normal,
            },
            atr: 0.0,
            volatility_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeReading {
    pub label: VolumeLabel,
    pub current: Option<f64>,
    pub average: Option<f64>,
    pub ratio: Option<f64>,
}

impl Default for VolumeReading {
    fn default() -> Self {
        Self {
            label: VolumeLabel::NoData,
            current: None,
            average: None,
            ratio: None,
        }
    }
}

/// Price and moving-average crossover state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovingAverageAlignment {
    pub price_above_sma_short: bool,
    pub price_above_sma_long: bool,
    pub sma_short_above_long: bool,
}

impl MovingAverageAlignment {
    /// Map the share of bullish flags onto `[-1, 1]`.
    pub fn score(&self) -> f64 {
        let flags = [
            self.price_above_sma_short,
            self.price_above_sma_long,
            self.sma_short_above_long,
        ];
        let bullish = flags.iter().filter(|f| **f).count() as f64;
        bullish / flags.len() as f64 * 2.0 - 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryLabel {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

/// Overall technical verdict from the trend and momentum scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSummary {
    pub label: SummaryLabel,
    pub confidence: u8,
    pub trend_direction: TrendDirection,
    pub trend_strength: f64,
    pub bullish_signals: i32,
    pub bearish_signals: i32,
    pub total_score: i32,
}

impl TechnicalSummary {
    pub fn from_scores(trend: &TrendReading, momentum_score: i32) -> Self {
        let total = trend.score + momentum_score;
        let (label, confidence) = match total {
            t if t >= 3 => (SummaryLabel::StrongBuy, 85),
            t if t >= 1 => (SummaryLabel::Buy, 70),
            t if t <= -3 => (SummaryLabel::StrongSell, 85),
            t if t <= -1 => (SummaryLabel::Sell, 70),
            _ => (SummaryLabel::Neutral, 50),
        };
        Self {
            label,
            confidence,
            trend_direction: trend.direction,
            trend_strength: trend.strength,
            bullish_signals: trend.score.max(0) + momentum_score.max(0),
            bearish_signals: -(trend.score.min(0)) - momentum_score.min(0),
            total_score: total,
        }
    }
}

impl Default for TechnicalSummary {
    fn default() -> Self {
        Self::from_scores(&TrendReading::default(), 0)
    }
}

/// All technical readings for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Timestamp of the last analyzed candle.
    pub timestamp: DateTime<Utc>,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub trend: TrendReading,
    pub momentum: MomentumReading,
    pub volatility: VolatilityReading,
    pub volume: VolumeReading,
    pub moving_averages: MovingAverageAlignment,
    pub support_resistance: Option<SupportResistance>,
    pub patterns: Vec<DetectedPattern>,
    pub important_levels: Vec<f64>,
    pub at_important_level: bool,
    pub summary: TechnicalSummary,
    /// Set on the neutral snapshot returned for short series.
    pub insufficient_data: bool,
}

impl IndicatorSnapshot {
    /// Neutral readings for a series that cannot be analyzed.
    pub fn neutral(series: &Series) -> Self {
        Self {
            symbol: series.pair.symbol.to_string(),
            timeframe: series.timeframe,
            timestamp: series.last().map(|c| c.timestamp).unwrap_or_else(Utc::now),
            last_price: series.last_close().unwrap_or(0.0),
            price_change: 0.0,
            price_change_percent: 0.0,
            trend: TrendReading::default(),
            momentum: MomentumReading::default(),
            volatility: VolatilityReading::default(),
            volume: VolumeReading::default(),
            moving_averages: MovingAverageAlignment::default(),
            support_resistance: None,
            patterns: Vec::new(),
            important_levels: Vec::new(),
            at_important_level: false,
            summary: TechnicalSummary::default(),
            insufficient_data: true,
        }
    }
}

/// Computes [`IndicatorSnapshot`]s.
#[derive(Clone, Debug, Default)]
pub struct TechnicalAnalyzer {
    config: IndicatorConfig,
}

impl TechnicalAnalyzer {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Analyze `series`, degrading to [`IndicatorSnapshot::neutral`] when it
    /// is too short. Never fails.
    pub fn analyze(&self, series: &Series) -> IndicatorSnapshot {
        match self.try_analyze(series) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("{} {}: {}", series.pair.symbol, series.timeframe, e);
                IndicatorSnapshot::neutral(series)
            }
        }
    }

    /// Analyze `series`, failing with
    /// [`AnalysisError::InsufficientSeriesLength`] when fewer than
    /// `min_candles` usable candles remain.
    pub fn try_analyze(&self, series: &Series) -> Result<IndicatorSnapshot> {
        let cfg = &self.config;
        let candles: Vec<Candle> = series
            .candles
            .iter()
            .filter(|c| c.close.is_finite() && c.high.is_finite() && c.low.is_finite())
            .copied()
            .collect();

        let required = cfg.min_candles.max(2);
        if candles.len() < required {
            return Err(AnalysisError::InsufficientSeriesLength {
                required,
                actual: candles.len(),
            });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        let n = closes.len();
        let price = closes[n - 1];
        let prev = closes[n - 2];
        let price_change = price - prev;
        let price_change_percent = if prev != 0.0 {
            price_change / prev * 100.0
        } else {
            0.0
        };

        let trend = self.trend(&closes);
        let momentum = self.momentum(&closes, &highs, &lows);
        let volatility = self.volatility(&closes, &highs, &lows);
        let volume = self.volume(&volumes);
        let moving_averages = MovingAverageAlignment {
            price_above_sma_short: price > trend.sma_short,
            price_above_sma_long: price > trend.sma_long,
            sma_short_above_long: trend.sma_short > trend.sma_long,
        };
        let support_resistance = support_resistance(
            &candles,
            cfg.pivot_span,
            cfg.max_sr_levels,
            cfg.sr_fallback_window,
        );
        let levels = important_levels(&candles, cfg.level_window, cfg.level_lookback_years);
        let at_important_level = is_at_important_level(price, &levels, cfg.level_tolerance);
        let summary = TechnicalSummary::from_scores(&trend, momentum.score);

        Ok(IndicatorSnapshot {
            symbol: series.pair.symbol.to_string(),
            timeframe: series.timeframe,
            timestamp: candles[n - 1].timestamp,
            last_price: price,
            price_change,
            price_change_percent,
            trend,
            momentum,
            volatility,
            volume,
            moving_averages,
            support_resistance,
            patterns: detect_patterns(&candles),
            important_levels: levels,
            at_important_level,
            summary,
            insufficient_data: false,
        })
    }

    fn trend(&self, closes: &[f64]) -> TrendReading {
        let cfg = &self.config;
        let price = last_or(closes, 0.0);
        let sma_short = last_or(&sma(closes, cfg.sma_short), price);
        let sma_long = last_or(&sma(closes, cfg.sma_long), price);
        let ema_fast = last_or(&ema(closes, cfg.ema_fast), price);
        let ema_slow = last_or(&ema(closes, cfg.ema_slow), price);

        let vote = |bullish: bool| if bullish { 1 } else { -1 };
        let score =
            vote(price > sma_short) + vote(sma_short > sma_long) + vote(ema_fast > ema_slow);

        let strength = match closes.len().checked_sub(cfg.trend_lookback.max(1)) {
            Some(i) if closes[i] != 0.0 => {
                let change = (price - closes[i]) / closes[i] * 100.0;
                (change.abs() * 10.0).min(100.0)
            }
            _ => 0.0,
        };

        TrendReading {
            direction: TrendDirection::from_score(score),
            strength,
            sma_short,
            sma_long,
            ema_fast,
            ema_slow,
            score,
        }
    }

    fn momentum(&self, closes: &[f64], highs: &[f64], lows: &[f64]) -> MomentumReading {
        let cfg = &self.config;

        let rsi_value = last_or(&rsi(closes, cfg.rsi_period), 50.0);
        let rsi_label = OscillatorLabel::classify(rsi_value, cfg.rsi_overbought, cfg.rsi_oversold);

        let m = macd(closes, cfg.ema_fast, cfg.ema_slow, cfg.macd_signal);
        let macd_line = last_or(&m.macd, 0.0);
        let signal_line = last_or(&m.signal, 0.0);
        let macd_direction = if macd_line > signal_line {
            TrendDirection::Bullish
        } else {
            TrendDirection::Bearish
        };

        let s = stochastic(highs, lows, closes, cfg.stochastic_k, cfg.stochastic_d);
        let k = last_or(&s.k, 50.0);
        let stoch_label =
            OscillatorLabel::classify(k, cfg.stochastic_overbought, cfg.stochastic_oversold);

        let w = last_or(&williams_r(highs, lows, closes, cfg.williams_period), -50.0);
        let williams_label = OscillatorLabel::classify(w, -20.0, -80.0);

        let macd_score = if macd_direction == TrendDirection::Bullish { 1 } else { -1 };
        MomentumReading {
            rsi: OscillatorReading {
                value: rsi_value,
                label: rsi_label,
            },
            macd: MacdReading {
                macd: macd_line,
                signal: signal_line,
                histogram: last_or(&m.histogram, 0.0),
                direction: macd_direction,
            },
            stochastic: StochasticReading {
                k,
                d: last_or(&s.d, 50.0),
                label: stoch_label,
            },
            williams_r: OscillatorReading {
                value: w,
                label: williams_label,
            },
            score: rsi_label.score() + macd_score + stoch_label.score(),
        }
    }

    fn volatility(&self, closes: &[f64], highs: &[f64], lows: &[f64]) -> VolatilityReading {
        let cfg = &self.config;
        let price = last_or(closes, 0.0);
        let bands = bollinger(closes, cfg.bollinger_period, cfg.bollinger_k);
        let upper = last_or(&bands.upper, price);
        let lower = last_or(&bands.lower, price);
        let atr = last_or(&atr(highs, lows, closes, cfg.atr_period), 0.0);

        VolatilityReading {
            bollinger: BollingerReading {
                upper,
                middle: last_or(&bands.middle, price),
                lower,
                position: BandPosition::classify(price, upper, lower),
            },
            atr,
            volatility_percent: if price > 0.0 { atr / price * 100.0 } else { 0.0 },
        }
    }

    fn volume(&self, volumes: &[f64]) -> VolumeReading {
        match volume_ratio(volumes, self.config.volume_period) {
            Some(r) => VolumeReading {
                label: r.label,
                current: Some(r.current),
                average: Some(r.average),
                ratio: Some(r.ratio),
            },
            None => VolumeReading::default(),
        }
    }
}
