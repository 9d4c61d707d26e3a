//! Price validation.
//!
//! Scores a single price observation for plausibility. Each check category
//! is evaluated independently and subtracts a fixed penalty from a starting
//! confidence of 100:
//! - Format (finite, positive, sensible decimal precision)
//! - Range (per-pair configured bounds)
//! - Market session (weekend closure for forex)
//! - Rate of change versus the last accepted price for the pair
//! - Timestamp sanity (future / very old)
//! - Freshness
//!
//! Also validates whole candle series before they are cached.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::models::{catalog, Pair, Series};

/// Default minimum confidence for a quote to be treated as authoritative.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 70;

/// Inclusive plausible price bounds for a pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Maximum fractional move allowed within `max_minutes`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChangeThreshold {
    pub max_minutes: f64,
    pub max_change: f64,
}

/// Confidence penalty per check category.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationPenalties {
    pub format: u8,
    pub precision: u8,
    pub range: u8,
    pub session: u8,
    pub change_warning: u8,
    pub change_error: u8,
    pub timestamp_future: u8,
    pub timestamp_old: u8,
    pub freshness_warning: u8,
    pub freshness_error: u8,
}

impl Default for ValidationPenalties {
    fn default() -> Self {
        Self {
            format: 30,
            precision: 5,
            range: 25,
            session: 10,
            change_warning: 15,
            change_error: 35,
            timestamp_future: 30,
            timestamp_old: 5,
            freshness_warning: 10,
            freshness_error: 30,
        }
    }
}

/// Price validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Bounds per pair symbol. Pairs without an entry pass with a warning.
    pub price_ranges: HashMap<String, PriceRange>,
    /// Rate-of-change table, ascending by `max_minutes`.
    pub change_thresholds: Vec<ChangeThreshold>,
    /// Allowed change when the elapsed time exceeds every table entry.
    pub max_change_beyond: f64,
    /// Crypto pairs get the table scaled by this factor.
    pub crypto_change_multiplier: f64,
    /// Tolerated clock skew into the future.
    pub future_tolerance: Duration,
    /// Timestamps older than this are flagged.
    pub max_timestamp_age: Duration,
    /// Age at which a quote stops being fresh.
    pub freshness_warning: Duration,
    /// Age at which a quote is rejected.
    pub freshness_error: Duration,
    pub min_confidence: u8,
    pub check_sessions: bool,
    pub history_size: usize,
    pub penalties: ValidationPenalties,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let price_ranges = catalog::all()
            .iter()
            .map(|p| {
                (
                    p.symbol.to_string(),
                    PriceRange {
                        min: p.min_price,
                        max: p.max_price,
                    },
                )
            })
            .collect();

        Self {
            price_ranges,
            change_thresholds: vec![
                ChangeThreshold {
                    max_minutes: 1.0,
                    max_change: 0.005,
                },
                ChangeThreshold {
                    max_minutes: 5.0,
                    max_change: 0.015,
                },
                ChangeThreshold {
                    max_minutes: 15.0,
                    max_change: 0.025,
                },
                ChangeThreshold {
                    max_minutes: 60.0,
                    max_change: 0.05,
                },
            ],
            max_change_beyond: 0.15,
            crypto_change_multiplier: 3.0,
            future_tolerance: Duration::from_secs(5 * 60),
            max_timestamp_age: Duration::from_secs(24 * 3_600),
            freshness_warning: Duration::from_secs(5 * 60),
            freshness_error: Duration::from_secs(3_600),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            check_sessions: true,
            history_size: 1_000,
            penalties: ValidationPenalties::default(),
        }
    }
}

/// Outcome of one check category.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Passed,
    /// Accepted, with a penalty
    Warning,
    /// Hard error; the quote is invalid
    Failed,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryCheck {
    pub status: CheckStatus,
    pub penalty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CategoryCheck {
    fn passed() -> Self {
        Self {
            status: CheckStatus::Passed,
            penalty: 0,
            detail: None,
        }
    }

    fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Skipped,
            penalty: 0,
            detail: Some(detail.into()),
        }
    }
}

/// Per-category breakdown of a validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationChecks {
    pub format: CategoryCheck,
    pub range: CategoryCheck,
    pub session: CategoryCheck,
    pub rate_of_change: CategoryCheck,
    pub timestamp: CategoryCheck,
    pub freshness: CategoryCheck,
}

/// Result of validating one price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence_score: u8,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub checks: ValidationChecks,
}

impl ValidationResult {
    /// Valid and at least `min_confidence`.
    pub fn is_acceptable(&self, min_confidence: u8) -> bool {
        self.is_valid && self.confidence_score >= min_confidence
    }

    /// One-line description of why the result is not acceptable.
    pub fn rejection_reason(&self) -> String {
        if self.errors.is_empty() {
            format!("confidence {} below threshold", self.confidence_score)
        } else {
            self.errors.join("; ")
        }
    }
}

/// Aggregate over recent validations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub total: usize,
    pub valid_percentage: f64,
    pub average_confidence: f64,
    pub last_hour: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validation: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
struct ValidationRecord {
    valid: bool,
    confidence: u8,
    at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
struct AcceptedPrice {
    price: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ValidatorState {
    last_accepted: HashMap<String, AcceptedPrice>,
    history: VecDeque<ValidationRecord>,
}

/// Accumulates penalties, warnings and errors across categories.
struct Assessment {
    confidence: i32,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Assessment {
    fn new() -> Self {
        Self {
            confidence: 100,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn warn(&mut self, penalty: u8, message: String) -> CategoryCheck {
        self.confidence -= i32::from(penalty);
        self.warnings.push(message.clone());
        CategoryCheck {
            status: CheckStatus::Warning,
            penalty,
            detail: Some(message),
        }
    }

    fn fail(&mut self, penalty: u8, message: String) -> CategoryCheck {
        self.confidence -= i32::from(penalty);
        self.errors.push(message.clone());
        CategoryCheck {
            status: CheckStatus::Failed,
            penalty,
            detail: Some(message),
        }
    }

    fn into_result(self, checks: ValidationChecks) -> ValidationResult {
        ValidationResult {
            is_valid: self.errors.is_empty(),
            confidence_score: self.confidence.clamp(0, 100) as u8,
            warnings: self.warnings,
            errors: self.errors,
            checks,
        }
    }
}

/// Price validator.
///
/// Stateless per call apart from the last accepted price per pair and a
/// bounded history used for [`stats`](Self::stats); both live behind one mutex.
pub struct PriceValidator {
    config: ValidatorConfig,
    state: Mutex<ValidatorState>,
}

impl PriceValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ValidatorState::default()),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn min_confidence(&self) -> u8 {
        self.config.min_confidence
    }

    fn lock_state(&self) -> MutexGuard<'_, ValidatorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Price validator mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Validate a price observed now.
    pub fn validate(
        &self,
        pair: &Pair,
        price: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> ValidationResult {
        self.validate_at(pair, price, timestamp, Utc::now())
    }

    /// Validate a price against an explicit clock.
    ///
    /// When the result is acceptable the price becomes the pair's reference
    /// for future rate-of-change checks.
    pub fn validate_at(
        &self,
        pair: &Pair,
        price: f64,
        timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let mut assessment = Assessment::new();
        let previous = self.last_accepted(pair);
        let observed_at = timestamp.unwrap_or(now);

        let format = self.check_format(pair, price, &mut assessment);
        let range = if format.status == CheckStatus::Failed {
            CategoryCheck::skipped("price not numeric")
        } else {
            self.check_range(pair, price, &mut assessment)
        };
        let session = self.check_session(pair, observed_at, &mut assessment);
        let rate_of_change = match previous {
            Some(prev) if format.status != CheckStatus::Failed => {
                self.check_change(pair, price, observed_at, prev, &mut assessment)
            }
            Some(_) => CategoryCheck::skipped("price not numeric"),
            None => CategoryCheck::skipped("no previously accepted price"),
        };
        let (timestamp_check, freshness) = match timestamp {
            Some(ts) => (
                self.check_timestamp(ts, now, &mut assessment),
                self.check_freshness(ts, now, &mut assessment),
            ),
            None => (
                CategoryCheck::skipped("no timestamp supplied"),
                CategoryCheck::skipped("no timestamp supplied"),
            ),
        };

        let result = assessment.into_result(ValidationChecks {
            format,
            range,
            session,
            rate_of_change,
            timestamp: timestamp_check,
            freshness,
        });

        let acceptable = result.is_acceptable(self.config.min_confidence);
        {
            let mut state = self.lock_state();
            if acceptable {
                state.last_accepted.insert(
                    pair.symbol.to_string(),
                    AcceptedPrice {
                        price,
                        timestamp: observed_at,
                    },
                );
            }
            if state.history.len() >= self.config.history_size.max(1) {
                state.history.pop_front();
            }
            state.history.push_back(ValidationRecord {
                valid: result.is_valid,
                confidence: result.confidence_score,
                at: now,
            });
        }

        if !result.is_valid {
            debug!(
                "Validation failed for {} at {}: {}",
                pair,
                price,
                result.errors.join("; ")
            );
        }
        result
    }

    pub fn is_acceptable(&self, result: &ValidationResult) -> bool {
        result.is_acceptable(self.config.min_confidence)
    }

    /// Last accepted price and its timestamp for a pair.
    pub fn last_accepted(&self, pair: &Pair) -> Option<(f64, DateTime<Utc>)> {
        self.lock_state()
            .last_accepted
            .get(pair.symbol.as_ref())
            .map(|a| (a.price, a.timestamp))
    }

    /// Forget the reference price for a pair.
    pub fn forget(&self, pair: &Pair) {
        self.lock_state().last_accepted.remove(pair.symbol.as_ref());
    }

    /// Clear reference prices and history.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.last_accepted.clear();
        state.history.clear();
    }

    pub fn stats(&self) -> ValidationStats {
        let state = self.lock_state();
        let total = state.history.len();
        if total == 0 {
            return ValidationStats::default();
        }
        let valid = state.history.iter().filter(|r| r.valid).count();
        let confidence_sum: u64 = state.history.iter().map(|r| u64::from(r.confidence)).sum();
        let hour_ago = Utc::now() - chrono::Duration::hours(1);

        ValidationStats {
            total,
            valid_percentage: valid as f64 / total as f64 * 100.0,
            average_confidence: confidence_sum as f64 / total as f64,
            last_hour: state.history.iter().filter(|r| r.at >= hour_ago).count(),
            last_validation: state.history.back().map(|r| r.at),
        }
    }

    /// Maximum allowed fractional change after `elapsed_minutes`.
    pub fn change_threshold(&self, pair: &Pair, elapsed_minutes: f64) -> f64 {
        let base = self
            .config
            .change_thresholds
            .iter()
            .find(|t| elapsed_minutes <= t.max_minutes)
            .map(|t| t.max_change)
            .unwrap_or(self.config.max_change_beyond);
        if pair.is_crypto() {
            base * self.config.crypto_change_multiplier
        } else {
            base
        }
    }

    fn check_format(&self, pair: &Pair, price: f64, a: &mut Assessment) -> CategoryCheck {
        let penalties = &self.config.penalties;
        if !price.is_finite() {
            return a.fail(penalties.format, format!("Price {} is not a finite number", price));
        }
        if price <= 0.0 {
            return a.fail(penalties.format, format!("Price {} is not positive", price));
        }

        let max_decimals = conventional_decimals(pair) + 1;
        match Decimal::from_str(&price.to_string()) {
            Ok(decimal) => {
                let scale = decimal.normalize().scale();
                if scale > max_decimals {
                    a.warn(
                        penalties.precision,
                        format!(
                            "Unusual precision for {}: {} decimals (expected at most {})",
                            pair, scale, max_decimals
                        ),
                    )
                } else {
                    CategoryCheck::passed()
                }
            }
            // Magnitude beyond Decimal; the range check will catch it.
            Err(_) => CategoryCheck::passed(),
        }
    }

    fn check_range(&self, pair: &Pair, price: f64, a: &mut Assessment) -> CategoryCheck {
        match self.config.price_ranges.get(pair.symbol.as_ref()) {
            Some(range) if range.contains(price) => CategoryCheck::passed(),
            Some(range) => a.fail(
                self.config.penalties.range,
                format!(
                    "Price {} outside expected range {}-{} for {}",
                    price, range.min, range.max, pair
                ),
            ),
            None => a.warn(0, format!("No price range configured for {}", pair)),
        }
    }

    fn check_session(&self, pair: &Pair, at: DateTime<Utc>, a: &mut Assessment) -> CategoryCheck {
        if pair.is_crypto() || !self.config.check_sessions {
            return CategoryCheck::skipped("24/7 market");
        }
        if is_forex_weekend(at) {
            return a.warn(
                self.config.penalties.session,
                format!("Forex market closed (weekend) at {}", at.format("%a %H:%M UTC")),
            );
        }
        let sessions = active_sessions(at);
        CategoryCheck {
            status: CheckStatus::Passed,
            penalty: 0,
            detail: Some(sessions.join(", ")),
        }
    }

    fn check_change(
        &self,
        pair: &Pair,
        price: f64,
        at: DateTime<Utc>,
        previous: (f64, DateTime<Utc>),
        a: &mut Assessment,
    ) -> CategoryCheck {
        let (last_price, last_at) = previous;
        if last_price <= 0.0 {
            return CategoryCheck::skipped("reference price not positive");
        }
        let elapsed_minutes = (at - last_at).num_milliseconds().unsigned_abs() as f64 / 60_000.0;
        let threshold = self.change_threshold(pair, elapsed_minutes);
        let change = (price - last_price).abs() / last_price;
        let penalties = &self.config.penalties;

        if change > threshold * 2.0 {
            a.fail(
                penalties.change_error,
                format!(
                    "Extreme move for {}: {:.2}% in {:.1} min (limit {:.2}%)",
                    pair,
                    change * 100.0,
                    elapsed_minutes,
                    threshold * 100.0
                ),
            )
        } else if change > threshold {
            a.warn(
                penalties.change_warning,
                format!(
                    "Large move for {}: {:.2}% in {:.1} min (limit {:.2}%)",
                    pair,
                    change * 100.0,
                    elapsed_minutes,
                    threshold * 100.0
                ),
            )
        } else {
            CategoryCheck::passed()
        }
    }

    fn check_timestamp(
        &self,
        ts: DateTime<Utc>,
        now: DateTime<Utc>,
        a: &mut Assessment,
    ) -> CategoryCheck {
        let penalties = &self.config.penalties;
        let ahead = (ts - now).to_std().unwrap_or(Duration::ZERO);
        if ahead > self.config.future_tolerance {
            return a.fail(
                penalties.timestamp_future,
                format!("Timestamp {} is {}s in the future", ts, ahead.as_secs()),
            );
        }
        let age = (now - ts).to_std().unwrap_or(Duration::ZERO);
        if age > self.config.max_timestamp_age {
            return a.warn(
                penalties.timestamp_old,
                format!("Timestamp {} is more than 24 hours old", ts),
            );
        }
        CategoryCheck::passed()
    }

    fn check_freshness(
        &self,
        ts: DateTime<Utc>,
        now: DateTime<Utc>,
        a: &mut Assessment,
    ) -> CategoryCheck {
        let penalties = &self.config.penalties;
        let age = (now - ts).to_std().unwrap_or(Duration::ZERO);
        if age > self.config.freshness_error {
            a.fail(
                penalties.freshness_error,
                format!("Quote is {} minutes old", age.as_secs() / 60),
            )
        } else if age > self.config.freshness_warning {
            a.warn(
                penalties.freshness_warning,
                format!("Quote is {} minutes old", age.as_secs() / 60),
            )
        } else {
            CategoryCheck::passed()
        }
    }

    /// Validate a candle series before caching.
    ///
    /// Inconsistent candles are dropped. Fails when nothing survives or the
    /// latest close is outside the pair's range.
    pub fn validate_series(&self, series: Series) -> Result<Series, MarketDataError> {
        let original_count = series.candles.len();
        let (valid, rejected): (Vec<_>, Vec<_>) = series
            .candles
            .iter()
            .copied()
            .partition(|c| c.is_consistent() && c.volume.is_finite() && c.volume >= 0.0);

        if !rejected.is_empty() {
            warn!(
                "Dropped {} of {} candles for {} from '{}'",
                rejected.len(),
                original_count,
                series.pair,
                series.source
            );
        }

        let last_close = match valid.last() {
            Some(candle) => candle.close,
            None => {
                return Err(MarketDataError::ValidationFailed {
                    message: format!(
                        "All {} candles for {} failed validation",
                        original_count, series.pair
                    ),
                })
            }
        };

        if let Some(range) = self.config.price_ranges.get(series.pair.symbol.as_ref()) {
            if !range.contains(last_close) {
                return Err(MarketDataError::ValidationFailed {
                    message: format!(
                        "Latest close {} outside expected range {}-{} for {}",
                        last_close, range.min, range.max, series.pair
                    ),
                });
            }
        }

        Ok(Series {
            candles: valid,
            ..series
        })
    }
}

impl Default for PriceValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn conventional_decimals(pair: &Pair) -> u32 {
    match pair.profile() {
        Some(profile) => profile.decimals,
        None if pair.is_crypto() => 8,
        None if pair.is_jpy() => 3,
        None => 5,
    }
}

/// Forex trades from Sunday 21:00 UTC to Friday 21:00 UTC.
pub fn is_forex_weekend(at: DateTime<Utc>) -> bool {
    match at.weekday() {
        Weekday::Sat => true,
        Weekday::Fri => at.hour() >= 21,
        Weekday::Sun => at.hour() < 21,
        _ => false,
    }
}

/// Major trading sessions open at `at` (UTC hours).
pub fn active_sessions(at: DateTime<Utc>) -> Vec<&'static str> {
    const SESSIONS: [(&str, u32, u32); 4] = [
        ("Sydney", 21, 6),
        ("Tokyo", 23, 8),
        ("London", 7, 16),
        ("New York", 12, 21),
    ];
    let hour = at.hour();
    SESSIONS
        .iter()
        .filter(|(_, open, close)| {
            if open < close {
                hour >= *open && hour < *close
            } else {
                hour >= *open || hour < *close
            }
        })
        .map(|(name, _, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, Timeframe};
    use chrono::TimeZone;

    fn eurusd() -> Pair {
        Pair::from_symbol("EURUSD").unwrap()
    }

    /// Wednesday 14:00 UTC, London and New York both open.
    fn midweek() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 14, 0, 0).unwrap()
    }

    fn minutes(n: i64) -> chrono::Duration {
        chrono::Duration::minutes(n)
    }

    #[test]
    fn test_steady_quote_after_accepted_is_full_confidence() {
        let validator = PriceValidator::new();
        let pair = eurusd();
        let t0 = midweek();

        let first = validator.validate_at(&pair, 1.0850, Some(t0), t0);
        assert!(first.is_acceptable(70));

        let later = t0 + minutes(5);
        let result = validator.validate_at(&pair, 1.0850, Some(later), later);
        assert!(result.is_valid);
        assert_eq!(result.confidence_score, 100);
        assert!(result.warnings.is_empty());
        assert_eq!(result.checks.rate_of_change.status, CheckStatus::Passed);
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        let validator = PriceValidator::new();
        let now = midweek();
        let result = validator.validate_at(&eurusd(), 2.5, Some(now), now);

        assert!(!result.is_valid);
        assert_eq!(result.checks.range.status, CheckStatus::Failed);
        assert_eq!(result.confidence_score, 75);
        assert!(validator.last_accepted(&eurusd()).is_none());
    }

    #[test]
    fn test_non_finite_and_negative_prices() {
        let validator = PriceValidator::new();
        let now = midweek();

        let nan = validator.validate_at(&eurusd(), f64::NAN, Some(now), now);
        assert!(!nan.is_valid);
        assert_eq!(nan.checks.format.status, CheckStatus::Failed);
        assert_eq!(nan.checks.range.status, CheckStatus::Skipped);

        let negative = validator.validate_at(&eurusd(), -1.08, Some(now), now);
        assert!(!negative.is_valid);
        assert!(negative.confidence_score <= 70);
    }

    #[test]
    fn test_excess_precision_is_warning() {
        let validator = PriceValidator::new();
        let now = midweek();
        let result = validator.validate_at(&eurusd(), 1.085012345, Some(now), now);

        assert!(result.is_valid);
        assert_eq!(result.checks.format.status, CheckStatus::Warning);
        assert_eq!(result.confidence_score, 95);
    }

    #[test]
    fn test_change_warning_and_error() {
        let validator = PriceValidator::new();
        let pair = eurusd();
        let t0 = midweek();
        validator.validate_at(&pair, 1.0000, Some(t0), t0);

        // 0.8% in one minute: above 0.5%, below 1.0%
        let t1 = t0 + minutes(1);
        let warn = validator.validate_at(&pair, 1.0080, Some(t1), t1);
        assert!(warn.is_valid);
        assert_eq!(warn.checks.rate_of_change.status, CheckStatus::Warning);
        assert_eq!(warn.confidence_score, 85);

        // 1.2% in one minute from the 1.0080 reference: more than twice 0.5%
        let t2 = t1 + minutes(1);
        let error = validator.validate_at(&pair, 1.0201, Some(t2), t2);
        assert!(!error.is_valid);
        assert_eq!(error.checks.rate_of_change.status, CheckStatus::Failed);
        assert_eq!(error.confidence_score, 65);
    }

    #[test]
    fn test_change_threshold_scales_with_elapsed_time() {
        let validator = PriceValidator::new();
        let pair = eurusd();
        assert_eq!(validator.change_threshold(&pair, 0.5), 0.005);
        assert_eq!(validator.change_threshold(&pair, 5.0), 0.015);
        assert_eq!(validator.change_threshold(&pair, 10.0), 0.025);
        assert_eq!(validator.change_threshold(&pair, 45.0), 0.05);
        assert_eq!(validator.change_threshold(&pair, 600.0), 0.15);

        let btc = Pair::from_symbol("BTCUSD").unwrap();
        assert!((validator.change_threshold(&btc, 0.5) - 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_rejected_quote_does_not_move_reference() {
        let validator = PriceValidator::new();
        let pair = eurusd();
        let t0 = midweek();
        validator.validate_at(&pair, 1.0850, Some(t0), t0);

        let t1 = t0 + minutes(1);
        validator.validate_at(&pair, 1.2000, Some(t1), t1);
        assert_eq!(validator.last_accepted(&pair).map(|(p, _)| p), Some(1.0850));
    }

    #[test]
    fn test_weekend_is_warning_only() {
        let validator = PriceValidator::new();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 16, 12, 0, 0).unwrap();
        let result = validator.validate_at(&eurusd(), 1.0850, Some(saturday), saturday);

        assert!(result.is_valid);
        assert_eq!(result.checks.session.status, CheckStatus::Warning);
        assert_eq!(result.confidence_score, 90);

        let btc = Pair::from_symbol("BTCUSD").unwrap();
        let crypto = validator.validate_at(&btc, 65_000.0, Some(saturday), saturday);
        assert_eq!(crypto.checks.session.status, CheckStatus::Skipped);
        assert_eq!(crypto.confidence_score, 100);
    }

    #[test]
    fn test_future_timestamp_is_hard_error() {
        let validator = PriceValidator::new();
        let now = midweek();
        let result = validator.validate_at(&eurusd(), 1.0850, Some(now + minutes(10)), now);

        assert!(!result.is_valid);
        assert_eq!(result.checks.timestamp.status, CheckStatus::Failed);

        let skew = validator.validate_at(&eurusd(), 1.0850, Some(now + minutes(2)), now);
        assert!(skew.is_valid);
    }

    #[test]
    fn test_freshness_levels() {
        let validator = PriceValidator::new();
        let now = midweek();

        let aging = validator.validate_at(&eurusd(), 1.0850, Some(now - minutes(10)), now);
        assert!(aging.is_valid);
        assert_eq!(aging.checks.freshness.status, CheckStatus::Warning);
        assert_eq!(aging.confidence_score, 90);

        let stale = validator.validate_at(&eurusd(), 1.0850, Some(now - minutes(90)), now);
        assert!(!stale.is_valid);
        assert_eq!(stale.checks.freshness.status, CheckStatus::Failed);

        let ancient = validator.validate_at(&eurusd(), 1.0850, Some(now - minutes(60 * 30)), now);
        assert_eq!(ancient.checks.timestamp.status, CheckStatus::Warning);
        assert_eq!(ancient.confidence_score, 65);
    }

    #[test]
    fn test_confidence_floors_at_zero() {
        let validator = PriceValidator::with_config(ValidatorConfig {
            penalties: ValidationPenalties {
                range: 90,
                freshness_error: 90,
                ..ValidationPenalties::default()
            },
            ..ValidatorConfig::default()
        });
        let now = midweek();
        let result = validator.validate_at(&eurusd(), 9.0, Some(now - minutes(120)), now);
        assert_eq!(result.confidence_score, 0);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_unknown_pair_range_warning() {
        let validator = PriceValidator::new();
        let now = midweek();
        let pair = Pair::custom("SEK", "NOK", crate::models::AssetClass::Forex);
        let result = validator.validate_at(&pair, 0.98, Some(now), now);

        assert!(result.is_valid);
        assert_eq!(result.checks.range.status, CheckStatus::Warning);
        assert_eq!(result.confidence_score, 100);
    }

    #[test]
    fn test_stats_track_history() {
        let validator = PriceValidator::new();
        assert_eq!(validator.stats().total, 0);

        validator.validate(&eurusd(), 1.0850, None);
        validator.validate(&eurusd(), 5.0, None);
        let stats = validator.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid_percentage, 50.0);
        assert_eq!(stats.last_hour, 2);
    }

    #[test]
    fn test_series_validation_drops_bad_candles() {
        let validator = PriceValidator::new();
        let pair = eurusd();
        let t0 = midweek();
        let good = Candle::new(t0, 1.08, 1.09, 1.07, 1.085, 10.0);
        let inverted = Candle::new(t0 + minutes(60), 1.08, 1.07, 1.09, 1.085, 10.0);
        let good_later = Candle::new(t0 + minutes(120), 1.085, 1.09, 1.08, 1.086, 10.0);
        let series = Series::new(
            pair,
            Timeframe::H1,
            vec![good, inverted, good_later],
            "YAHOO",
            Duration::from_secs(600),
        );

        let validated = validator.validate_series(series).unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(validated.last_close(), Some(1.086));
    }

    #[test]
    fn test_series_validation_rejects_out_of_range() {
        let validator = PriceValidator::new();
        let t0 = midweek();
        let candle = Candle::new(t0, 3.0, 3.1, 2.9, 3.0, 0.0);
        let series = Series::new(eurusd(), Timeframe::D1, vec![candle], "YAHOO", Duration::ZERO);
        assert!(matches!(
            validator.validate_series(series),
            Err(MarketDataError::ValidationFailed { .. })
        ));

        let empty = Series::new(eurusd(), Timeframe::D1, vec![], "YAHOO", Duration::ZERO);
        assert!(validator.validate_series(empty).is_err());
    }

    #[test]
    fn test_sessions() {
        let at = |h| Utc.with_ymd_and_hms(2024, 3, 13, h, 0, 0).unwrap();
        assert_eq!(active_sessions(at(14)), vec!["London", "New York"]);
        assert_eq!(active_sessions(at(23)), vec!["Sydney", "Tokyo"]);
        assert!(is_forex_weekend(Utc.with_ymd_and_hms(2024, 3, 15, 22, 0, 0).unwrap()));
        assert!(!is_forex_weekend(Utc.with_ymd_and_hms(2024, 3, 17, 22, 0, 0).unwrap()));
    }
}
