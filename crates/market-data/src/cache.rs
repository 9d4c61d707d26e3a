//! In-memory TTL cache for quotes and series.
//!
//! Entries are keyed by pair, data kind and (for series) timeframe/period.
//! An expired entry is a miss on [`MarketCache::get`] and is evicted into a
//! bounded stale area; only [`MarketCache::get_best_effort`] reads from there,
//! and it labels what it returns as [`Lookup::Stale`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::models::{Pair, Period, Series, Timeframe, ValidatedQuote};

/// Kind of data stored under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKind {
    Quote,
    Series,
    /// Synthetic quote produced by the fallback generator
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub pair: String,
    pub kind: DataKind,
    pub timeframe: Option<Timeframe>,
    pub period: Option<Period>,
}

impl CacheKey {
    pub fn quote(pair: &Pair) -> Self {
        Self {
            pair: pair.symbol.to_string(),
            kind: DataKind::Quote,
            timeframe: None,
            period: None,
        }
    }

    pub fn fallback(pair: &Pair) -> Self {
        Self {
            kind: DataKind::Fallback,
            ..Self::quote(pair)
        }
    }

    pub fn series(pair: &Pair, period: Period, timeframe: Timeframe) -> Self {
        Self {
            pair: pair.symbol.to_string(),
            kind: DataKind::Series,
            timeframe: Some(timeframe),
            period: Some(period),
        }
    }
}

/// Cached payload.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Quote(ValidatedQuote),
    Series(Arc<Series>),
}

impl CachedValue {
    pub fn into_quote(self) -> Option<ValidatedQuote> {
        match self {
            Self::Quote(quote) => Some(quote),
            Self::Series(_) => None,
        }
    }

    pub fn into_series(self) -> Option<Arc<Series>> {
        match self {
            Self::Series(series) => Some(series),
            Self::Quote(_) => None,
        }
    }
}

/// Result of a best-effort lookup.
#[derive(Debug, Clone)]
pub enum Lookup<V> {
    Fresh(V),
    Stale(V),
    Miss,
}

impl<V> Lookup<V> {
    pub fn map<U>(self, f: impl FnOnce(V) -> Option<U>) -> Lookup<U> {
        match self {
            Self::Fresh(v) => f(v).map_or(Lookup::Miss, Lookup::Fresh),
            Self::Stale(v) => f(v).map_or(Lookup::Miss, Lookup::Stale),
            Self::Miss => Lookup::Miss,
        }
    }
}

/// Cache configuration.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub quote_ttl: Duration,
    pub series_ttl: Duration,
    pub fallback_ttl: Duration,
    /// How long expired entries stay available to best-effort reads.
    pub stale_retention: Duration,
    pub max_stale_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(120),
            series_ttl: Duration::from_secs(600),
            fallback_ttl: Duration::from_secs(30),
            stale_retention: Duration::from_secs(3_600),
            max_stale_entries: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Quote => self.quote_ttl,
            DataKind::Series => self.series_ttl,
            DataKind::Fallback => self.fallback_ttl,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub stale_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub expirations: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    live: HashMap<CacheKey, CacheEntry>,
    stale: HashMap<CacheKey, CacheEntry>,
    stats: CacheStats,
}

impl CacheInner {
    fn retire(&mut self, key: CacheKey, entry: CacheEntry, max_stale: usize) {
        self.stats.expirations += 1;
        if max_stale == 0 {
            return;
        }
        if self.stale.len() >= max_stale && !self.stale.contains_key(&key) {
            let oldest = self
                .stale
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.stale.remove(&oldest);
            }
        }
        self.stale.insert(key, entry);
    }
}

/// Thread-safe market data cache shared by all concurrent fetches.
pub struct MarketCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Lock the cache mutex, recovering from poison if necessary.
    fn lock_inner(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Market cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Fresh value for `key`, or `None`. Expired entries are evicted.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let now = Instant::now();
        let mut guard = self.lock_inner();
        let inner = &mut *guard;

        let expired = match inner.live.get(key) {
            Some(entry) if now < entry.expires_at => {
                let value = entry.value.clone();
                inner.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some(entry) = inner.live.remove(key) {
                debug!("Cache: entry for {:?} expired", key);
                inner.retire(key.clone(), entry, self.config.max_stale_entries);
            }
        }
        inner.stats.misses += 1;
        None
    }

    /// Store `value` under `key` for `ttl`. A zero TTL stores nothing.
    pub fn set(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut inner = self.lock_inner();
        inner.stale.remove(&key);
        inner.live.insert(key, entry);
    }

    /// Store `value` with the configured TTL for its kind.
    pub fn set_default(&self, key: CacheKey, value: CachedValue) {
        let ttl = self.config.ttl_for(key.kind);
        self.set(key, value, ttl);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        let mut inner = self.lock_inner();
        inner.live.remove(key);
        inner.stale.remove(key);
    }

    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.live.clear();
        inner.stale.clear();
    }

    /// Lookup that may return expired data, for degraded operation only.
    pub fn get_best_effort(&self, key: &CacheKey) -> Lookup<CachedValue> {
        if let Some(value) = self.get(key) {
            return Lookup::Fresh(value);
        }

        let now = Instant::now();
        let retention = self.config.stale_retention;
        let mut guard = self.lock_inner();
        let inner = &mut *guard;

        let usable = match inner.stale.get(key) {
            Some(entry) => now.saturating_duration_since(entry.expires_at) <= retention,
            None => return Lookup::Miss,
        };

        if usable {
            if let Some(entry) = inner.stale.get(key) {
                let value = entry.value.clone();
                inner.stats.stale_hits += 1;
                return Lookup::Stale(value);
            }
        } else {
            inner.stale.remove(key);
        }
        Lookup::Miss
    }

    /// Evict every expired live entry and drop stale entries past retention.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let retention = self.config.stale_retention;
        let max_stale = self.config.max_stale_entries;
        let mut guard = self.lock_inner();
        let inner = &mut *guard;

        let expired: Vec<CacheKey> = inner
            .live
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            if let Some(entry) = inner.live.remove(key) {
                inner.retire(key.clone(), entry, max_stale);
            }
        }
        inner
            .stale
            .retain(|_, e| now.saturating_duration_since(e.expires_at) <= retention);
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock_inner().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock_inner();
        CacheStats {
            entries: inner.live.len(),
            stale_entries: inner.stale.len(),
            ..inner.stats.clone()
        }
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;
    use chrono::Utc;

    fn eurusd() -> Pair {
        Pair::from_symbol("EURUSD").unwrap()
    }

    fn quote_value(price: f64) -> CachedValue {
        let quote = Quote::new(eurusd(), price, "YAHOO", Utc::now());
        CachedValue::Quote(ValidatedQuote::accepted(quote, 100, vec![]))
    }

    fn price_of(value: CachedValue) -> f64 {
        value.into_quote().unwrap().price()
    }

    #[test]
    fn test_set_then_get() {
        let cache = MarketCache::new();
        let key = CacheKey::quote(&eurusd());

        assert!(cache.get(&key).is_none());
        cache.set(key.clone(), quote_value(1.0851), Duration::from_secs(60));
        assert_eq!(price_of(cache.get(&key).unwrap()), 1.0851);

        cache.set(key.clone(), quote_value(1.0852), Duration::from_secs(60));
        assert_eq!(price_of(cache.get(&key).unwrap()), 1.0852);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expired_entry_is_miss_and_removed() {
        let cache = MarketCache::new();
        let key = CacheKey::quote(&eurusd());

        cache.set(key.clone(), quote_value(1.0851), Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().stale_entries, 1);
    }

    #[test]
    fn test_best_effort_returns_flagged_stale() {
        let cache = MarketCache::new();
        let key = CacheKey::quote(&eurusd());

        cache.set(key.clone(), quote_value(1.0851), Duration::from_millis(20));
        assert!(matches!(cache.get_best_effort(&key), Lookup::Fresh(_)));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&key).is_none());
        match cache.get_best_effort(&key) {
            Lookup::Stale(value) => assert_eq!(price_of(value), 1.0851),
            other => panic!("expected stale entry, got {:?}", other),
        }
        assert_eq!(cache.stats().stale_hits, 1);
    }

    #[test]
    fn test_stale_retention_bound() {
        let cache = MarketCache::with_config(CacheConfig {
            stale_retention: Duration::from_millis(10),
            ..CacheConfig::default()
        });
        let key = CacheKey::quote(&eurusd());

        cache.set(key.clone(), quote_value(1.0851), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(40));
        assert!(matches!(cache.get_best_effort(&key), Lookup::Miss));
    }

    #[test]
    fn test_keys_distinguish_kind_and_timeframe() {
        let pair = eurusd();
        let cache = MarketCache::new();
        let series = Arc::new(Series::empty(pair.clone(), Timeframe::H1));

        cache.set_default(CacheKey::quote(&pair), quote_value(1.0851));
        cache.set_default(
            CacheKey::series(&pair, Period::Mo1, Timeframe::H1),
            CachedValue::Series(series),
        );

        assert!(cache
            .get(&CacheKey::series(&pair, Period::Mo1, Timeframe::D1))
            .is_none());
        assert!(cache.get(&CacheKey::fallback(&pair)).is_none());
        assert!(cache
            .get(&CacheKey::series(&pair, Period::Mo1, Timeframe::H1))
            .and_then(CachedValue::into_series)
            .is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = MarketCache::new();
        let key = CacheKey::quote(&eurusd());

        cache.set_default(key.clone(), quote_value(1.0851));
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
        assert!(matches!(cache.get_best_effort(&key), Lookup::Miss));

        cache.set_default(key.clone(), quote_value(1.0851));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_not_stored() {
        let cache = MarketCache::new();
        let key = CacheKey::quote(&eurusd());
        cache.set(key.clone(), quote_value(1.0851), Duration::ZERO);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let cache = MarketCache::new();
        let pair = eurusd();
        cache.set(CacheKey::quote(&pair), quote_value(1.0851), Duration::from_millis(5));
        cache.set(CacheKey::fallback(&pair), quote_value(1.0850), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
