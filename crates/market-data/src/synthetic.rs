//! Deterministic synthetic quotes and series.
//!
//! Used when every provider failed or emergency mode is active. Output is a
//! pure function of (pair, data kind, time bucket): the RNG seed is the
//! first eight bytes of `SHA-256("{symbol}|{kind}|{bucket}")`, where
//! `bucket` is the Unix time divided by the bucket length (one minute by
//! default). Two calls for the same pair inside one bucket therefore return
//! identical data.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use num_traits::{FromPrimitive, ToPrimitive};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::models::{Candle, Pair, PairProfile, Period, Quote, Series, Timeframe, FALLBACK_SOURCE};

/// Synthetic generator configuration.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Length of the seeding time bucket.
    pub bucket: Duration,
    /// Maximum relative distance of a synthetic quote from the base price.
    pub max_perturbation: f64,
    /// Upper bound on synthetic series length.
    pub max_candles: usize,
    /// Hourly return standard deviation for forex walks.
    pub forex_hourly_volatility: f64,
    /// Hourly return standard deviation for crypto walks.
    pub crypto_hourly_volatility: f64,
    /// Fraction of the distance to the base price recovered each step.
    pub mean_reversion: f64,
    /// Lifetime stamped on generated series.
    pub ttl: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bucket: Duration::from_secs(60),
            max_perturbation: 0.005,
            max_candles: 2_000,
            forex_hourly_volatility: 0.0015,
            crypto_hourly_volatility: 0.008,
            mean_reversion: 0.02,
            ttl: Duration::from_secs(30),
        }
    }
}

/// Seeded generator for fallback data.
#[derive(Clone, Debug, Default)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn bucket_index(&self, now: DateTime<Utc>) -> i64 {
        let len = self.config.bucket.as_secs().max(1) as i64;
        now.timestamp().div_euclid(len)
    }

    fn rng(&self, pair: &Pair, kind: &str, now: DateTime<Utc>) -> StdRng {
        StdRng::seed_from_u64(seed(&pair.symbol, kind, self.bucket_index(now)))
    }

    /// Fallback quote around the pair's catalog base price.
    ///
    /// Returns `None` for pairs outside the catalog. The quote's timestamp
    /// is the start of the bucket.
    pub fn quote(&self, pair: &Pair, now: DateTime<Utc>) -> Option<Quote> {
        let profile = pair.profile()?;
        let mut rng = self.rng(pair, "quote", now);
        let max = self.config.max_perturbation.abs();
        let perturbation = if max > 0.0 {
            rng.gen_range(-max..=max)
        } else {
            0.0
        };
        let price = round_to(profile.base_price * (1.0 + perturbation), profile.decimals);

        let len = self.config.bucket.as_secs().max(1) as i64;
        let bucket_start = Utc
            .timestamp_opt(self.bucket_index(now) * len, 0)
            .single()
            .unwrap_or(now);
        Some(Quote::new(pair.clone(), price, FALLBACK_SOURCE, bucket_start))
    }

    /// Fallback series: a mean-reverting random walk around the base price,
    /// ending at the timeframe boundary at or before `now`.
    ///
    /// Returns `None` for pairs outside the catalog.
    pub fn series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Option<Series> {
        let profile = pair.profile()?;
        let count = period
            .candle_count(timeframe)
            .min(self.config.max_candles.max(1));
        let step = timeframe.duration().as_secs().max(1) as i64;
        let last_open = now.timestamp().div_euclid(step) * step;

        let hourly = if pair.is_crypto() {
            self.config.crypto_hourly_volatility
        } else {
            self.config.forex_hourly_volatility
        };
        let sigma = hourly * (step as f64 / 3_600.0).sqrt();
        let returns = Normal::new(0.0, sigma.max(1e-9)).ok()?;
        let wicks = Normal::new(0.0, (sigma * 0.5).max(1e-9)).ok()?;

        let kind = format!("series|{}|{}", period.as_str(), timeframe.as_str());
        let mut rng = self.rng(pair, &kind, now);
        let mut price = profile.base_price;
        let mut candles = Vec::with_capacity(count);

        for i in 0..count {
            let offset = (count - 1 - i) as i64 * step;
            let Some(timestamp) = Utc.timestamp_opt(last_open - offset, 0).single() else {
                continue;
            };

            let open = price;
            let pull =
                self.config.mean_reversion * (profile.base_price - open) / profile.base_price;
            let ret: f64 = rng.sample(returns) + pull;
            let close = clamp_to_range(open * (1.0 + ret), profile);

            let upper_wick = rng.sample(wicks).abs();
            let lower_wick = rng.sample(wicks).abs();
            let high = open.max(close) * (1.0 + upper_wick);
            let low = open.min(close) * (1.0 - lower_wick);
            let volume: f64 = if pair.is_crypto() {
                rng.gen_range(10.0..1_000.0)
            } else {
                rng.gen_range(1_000.0..10_000.0)
            };

            let d = profile.decimals;
            candles.push(Candle::new(
                timestamp,
                round_to(open, d),
                round_to(high, d),
                round_to(low, d),
                round_to(close, d),
                volume.round(),
            ));
            price = close;
        }

        Some(Series::new(
            pair.clone(),
            timeframe,
            candles,
            FALLBACK_SOURCE,
            self.config.ttl,
        ))
    }
}

/// First eight bytes of `SHA-256("{symbol}|{kind}|{bucket}")`, big-endian.
pub fn seed(symbol: &str, kind: &str, bucket: i64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(bucket.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Round half away from zero to `decimals` places.
fn round_to(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(decimals))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

fn clamp_to_range(price: f64, profile: &PairProfile) -> f64 {
    price.clamp(profile.min_price, profile.max_price)
}
