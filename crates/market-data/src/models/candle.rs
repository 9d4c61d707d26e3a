use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pair::Pair;
use super::quote::FALLBACK_SOURCE;
use crate::errors::MarketDataError;

/// OHLCV candle
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// low <= {open, close} <= high, all prices finite and positive.
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Candle interval
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1wk")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Self::M1,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H4,
        Self::D1,
        Self::W1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
            Self::W1 => "1wk",
        }
    }

    pub fn duration(&self) -> Duration {
        let minutes = match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn is_intraday(&self) -> bool {
        *self < Self::D1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" => Ok(Self::M1),
            "5m" | "5min" => Ok(Self::M5),
            "15m" | "15min" => Ok(Self::M15),
            "30m" | "30min" => Ok(Self::M30),
            "1h" | "60m" | "60min" => Ok(Self::H1),
            "4h" => Ok(Self::H4),
            "1d" | "daily" => Ok(Self::D1),
            "1wk" | "1w" | "weekly" => Ok(Self::W1),
            other => Err(MarketDataError::UnsupportedTimeframe(other.to_string())),
        }
    }
}

/// Lookback window of a historical request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "5d")]
    D5,
    #[serde(rename = "1mo")]
    Mo1,
    #[serde(rename = "3mo")]
    Mo3,
    #[serde(rename = "6mo")]
    Mo6,
    #[serde(rename = "1y")]
    Y1,
    #[serde(rename = "2y")]
    Y2,
    #[serde(rename = "5y")]
    Y5,
    #[serde(rename = "10y")]
    Y10,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::D1 => "1d",
            Self::D5 => "5d",
            Self::Mo1 => "1mo",
            Self::Mo3 => "3mo",
            Self::Mo6 => "6mo",
            Self::Y1 => "1y",
            Self::Y2 => "2y",
            Self::Y5 => "5y",
            Self::Y10 => "10y",
        }
    }

    pub fn days(&self) -> u64 {
        match self {
            Self::D1 => 1,
            Self::D5 => 5,
            Self::Mo1 => 30,
            Self::Mo3 => 91,
            Self::Mo6 => 182,
            Self::Y1 => 365,
            Self::Y2 => 730,
            Self::Y5 => 1_826,
            Self::Y10 => 3_652,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.days() * 86_400)
    }

    /// Number of candles this period spans at the given timeframe.
    pub fn candle_count(&self, timeframe: Timeframe) -> usize {
        let span = self.duration().as_secs();
        let step = timeframe.duration().as_secs().max(1);
        (span / step).max(1) as usize
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Self::D1),
            "5d" => Ok(Self::D5),
            "1mo" => Ok(Self::Mo1),
            "3mo" => Ok(Self::Mo3),
            "6mo" => Ok(Self::Mo6),
            "1y" => Ok(Self::Y1),
            "2y" => Ok(Self::Y2),
            "5y" => Ok(Self::Y5),
            "10y" => Ok(Self::Y10),
            other => Err(MarketDataError::UnsupportedPeriod(other.to_string())),
        }
    }
}

/// Chronological candle series for one pair and timeframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Series {
    /// Build a series; candles are sorted and duplicate timestamps collapsed
    /// (the later candle wins).
    pub fn new(
        pair: Pair,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        source: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let fetched_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            pair,
            timeframe,
            candles: normalize(candles),
            source: source.into(),
            fetched_at,
            expires_at: fetched_at + ttl,
        }
    }

    pub fn empty(pair: Pair, timeframe: Timeframe) -> Self {
        Self::new(pair, timeframe, Vec::new(), FALLBACK_SOURCE, Duration::ZERO)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Keep only the most recent `max` candles.
    pub fn truncate_to_last(&mut self, max: usize) {
        if self.candles.len() > max {
            let excess = self.candles.len() - max;
            self.candles.drain(..excess);
        }
    }
}

fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}
