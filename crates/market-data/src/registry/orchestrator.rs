//! Acquisition orchestrator.
//!
//! Drives the cache → provider chain → validator → fallback pipeline for
//! current prices and historical series:
//!
//! 1. Fresh cache entries are returned immediately.
//! 2. While emergency mode is active the provider chain is bypassed.
//! 3. Providers serving the pair's asset class are tried in priority order.
//!    Each call is gated by the rate governor, bounded by the provider's
//!    timeout and recorded afterwards.
//! 4. Data the validator accepts is cached and returned.
//! 5. Otherwise the degraded path serves flagged stale data if allowed,
//!    then deterministic synthetic data.
//!
//! Provider failures never reach the caller; they are logged and kept in
//! [`FetchDiagnostics`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use super::{DataOrigin, FetchDiagnostics, PriceValidator, RateGovernor, SkipReason};
use crate::cache::{CacheKey, CachedValue, Lookup, MarketCache};
use crate::errors::MarketDataError;
use crate::models::{Pair, Period, ProviderId, Quote, Series, Timeframe, ValidatedQuote};
use crate::provider::MarketDataProvider;
use crate::synthetic::SyntheticGenerator;

/// Orchestrator configuration.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Serve expired cache entries before synthesizing data.
    pub serve_stale: bool,
    /// Provider series longer than this keep only their latest candles.
    pub max_series_candles: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            serve_stale: true,
            max_series_candles: 2_000,
        }
    }
}

/// Which operation a provider is being selected for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Quote,
    Series,
}

pub struct AcquisitionOrchestrator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    governor: Arc<RateGovernor>,
    cache: Arc<MarketCache>,
    validator: Arc<PriceValidator>,
    synthetic: SyntheticGenerator,
    /// Priority overrides (provider id -> priority). Lower is tried first.
    custom_priorities: HashMap<String, i32>,
    config: OrchestratorConfig,
}

impl AcquisitionOrchestrator {
    /// Create an orchestrator over shared state.
    ///
    /// Registers each provider's declared quota with the governor.
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        governor: Arc<RateGovernor>,
        cache: Arc<MarketCache>,
        validator: Arc<PriceValidator>,
    ) -> Self {
        for provider in &providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            governor.configure(&provider_id, provider.quota());
        }

        Self {
            providers,
            governor,
            cache,
            validator,
            synthetic: SyntheticGenerator::default(),
            custom_priorities: HashMap::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticGenerator) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// User-configured priorities, keyed by provider id.
    pub fn with_priorities(mut self, custom_priorities: HashMap<String, i32>) -> Self {
        self.custom_priorities = custom_priorities;
        self
    }

    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn cache(&self) -> &Arc<MarketCache> {
        &self.cache
    }

    pub fn validator(&self) -> &Arc<PriceValidator> {
        &self.validator
    }

    // ------------------------------------------------------------------
    // Current price
    // ------------------------------------------------------------------

    /// Current price for a pair.
    ///
    /// Fails only with `NoDataAvailable`, when no provider succeeded and the
    /// pair has no synthetic fallback.
    pub async fn current_price(&self, pair: &Pair) -> Result<f64, MarketDataError> {
        self.validated_quote(pair).await.map(|q| q.price())
    }

    /// Current quote with confidence, quality label and warnings.
    pub async fn validated_quote(&self, pair: &Pair) -> Result<ValidatedQuote, MarketDataError> {
        let (result, diagnostics) = self.fetch_quote_with_diagnostics(pair).await;
        debug!("Quote for {}: {}", pair, diagnostics.summary());
        result
    }

    /// Like [`validated_quote`](Self::validated_quote), also returning the
    /// per-provider trace.
    pub async fn fetch_quote_with_diagnostics(
        &self,
        pair: &Pair,
    ) -> (Result<ValidatedQuote, MarketDataError>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();

        for key in [CacheKey::quote(pair), CacheKey::fallback(pair)] {
            if let Some(quote) = self.cache.get(&key).and_then(CachedValue::into_quote) {
                diagnostics.set_origin(DataOrigin::Cache);
                return (Ok(quote), diagnostics);
            }
        }

        if self.governor.is_emergency() {
            debug!(
                "{}: bypassing providers for {}",
                MarketDataError::EmergencyModeActive,
                pair
            );
            self.record_emergency_skips(pair, Operation::Quote, &mut diagnostics);
        } else if let Some(quote) = self.quote_from_providers(pair, &mut diagnostics).await {
            return (Ok(quote), diagnostics);
        }

        let result = self.degraded_quote(pair, &mut diagnostics);
        (result, diagnostics)
    }

    async fn quote_from_providers(
        &self,
        pair: &Pair,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<ValidatedQuote> {
        for provider in self.eligible_providers(pair, Operation::Quote, diagnostics) {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !self.governor.try_acquire(&provider_id) {
                diagnostics.record_skip(provider_id, SkipReason::RateLimited);
                continue;
            }

            let outcome = tokio::time::timeout(provider.timeout(), provider.fetch_quote(pair))
                .await
                .unwrap_or_else(|_| {
                    Err(MarketDataError::Timeout {
                        provider: provider_id.to_string(),
                    })
                });
            self.governor.settle(&provider_id, outcome.is_ok()).await;

            let point = match outcome {
                Ok(point) => point,
                Err(e) => {
                    warn!(
                        "Provider '{}' failed for {} ({:?}): {}",
                        provider_id,
                        pair,
                        e.retry_class(),
                        e
                    );
                    diagnostics.record_error(provider_id, e.to_string());
                    continue;
                }
            };

            let result = self.validator.validate(pair, point.price, point.timestamp);
            if !self.validator.is_acceptable(&result) {
                let reason = result.rejection_reason();
                warn!(
                    "Rejected {} = {} from '{}' (confidence {}): {}",
                    pair, point.price, provider_id, result.confidence_score, reason
                );
                diagnostics.record_rejection(provider_id, reason);
                continue;
            }

            let quote = Quote::new(
                pair.clone(),
                point.price,
                provider_id.to_string(),
                point.timestamp.unwrap_or_else(Utc::now),
            );
            let validated =
                ValidatedQuote::accepted(quote, result.confidence_score, result.warnings);
            self.cache
                .set_default(CacheKey::quote(pair), CachedValue::Quote(validated.clone()));
            diagnostics.record_success(provider_id);
            return Some(validated);
        }
        None
    }

    fn degraded_quote(
        &self,
        pair: &Pair,
        diagnostics: &mut FetchDiagnostics,
    ) -> Result<ValidatedQuote, MarketDataError> {
        if self.config.serve_stale {
            match self
                .cache
                .get_best_effort(&CacheKey::quote(pair))
                .map(CachedValue::into_quote)
            {
                Lookup::Fresh(quote) => {
                    diagnostics.set_origin(DataOrigin::Cache);
                    return Ok(quote);
                }
                Lookup::Stale(quote) => {
                    warn!(
                        "Serving stale quote for {} from '{}'",
                        pair, quote.quote.source
                    );
                    diagnostics.set_origin(DataOrigin::StaleCache);
                    return Ok(quote.into_stale());
                }
                Lookup::Miss => {}
            }
        }

        match self.synthetic.quote(pair, Utc::now()) {
            Some(quote) => {
                info!("Serving synthetic fallback for {} at {}", pair, quote.price);
                let validated = ValidatedQuote::synthetic(quote);
                self.cache
                    .set_default(CacheKey::fallback(pair), CachedValue::Quote(validated.clone()));
                diagnostics.set_origin(DataOrigin::Synthetic);
                Ok(validated)
            }
            None => {
                warn!(
                    "No data available for {}: {}",
                    pair,
                    diagnostics.summary()
                );
                Err(MarketDataError::NoDataAvailable {
                    pair: pair.symbol.to_string(),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Historical series
    // ------------------------------------------------------------------

    /// Historical candles for a pair. Empty when nothing, not even a
    /// fallback, is available.
    pub async fn historical_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Arc<Series> {
        let (series, diagnostics) = self
            .fetch_series_with_diagnostics(pair, period, timeframe)
            .await;
        debug!(
            "Series for {} {} {}: {}",
            pair,
            period.as_str(),
            timeframe.as_str(),
            diagnostics.summary()
        );
        series
    }

    /// Like [`historical_series`](Self::historical_series), also returning
    /// the per-provider trace. A stale series is reported through
    /// `DataOrigin::StaleCache`.
    pub async fn fetch_series_with_diagnostics(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> (Arc<Series>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();
        let key = CacheKey::series(pair, period, timeframe);

        if let Some(series) = self.cache.get(&key).and_then(CachedValue::into_series) {
            diagnostics.set_origin(DataOrigin::Cache);
            return (series, diagnostics);
        }

        if self.governor.is_emergency() {
            self.record_emergency_skips(pair, Operation::Series, &mut diagnostics);
        } else if let Some(series) = self
            .series_from_providers(pair, period, timeframe, &mut diagnostics)
            .await
        {
            return (series, diagnostics);
        }

        let series = self.degraded_series(pair, period, timeframe, &key, &mut diagnostics);
        (series, diagnostics)
    }

    async fn series_from_providers(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
        diagnostics: &mut FetchDiagnostics,
    ) -> Option<Arc<Series>> {
        let ttl = self.cache.config().series_ttl;

        for provider in self.eligible_providers(pair, Operation::Series, diagnostics) {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !self.governor.try_acquire(&provider_id) {
                diagnostics.record_skip(provider_id, SkipReason::RateLimited);
                continue;
            }

            let outcome = tokio::time::timeout(
                provider.timeout(),
                provider.fetch_series(pair, period, timeframe),
            )
            .await
            .unwrap_or_else(|_| {
                Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                })
            });
            self.governor.settle(&provider_id, outcome.is_ok()).await;

            let candles = match outcome {
                Ok(candles) if candles.is_empty() => {
                    diagnostics.record_error(provider_id, "empty series".to_string());
                    continue;
                }
                Ok(candles) => candles,
                Err(e) => {
                    warn!("Provider '{}' series failed for {}: {}", provider_id, pair, e);
                    diagnostics.record_error(provider_id, e.to_string());
                    continue;
                }
            };

            let raw = Series::new(pair.clone(), timeframe, candles, provider.id(), ttl);
            let mut series = match self.validator.validate_series(raw) {
                Ok(series) => series,
                Err(e) => {
                    warn!("Rejected series from '{}': {}", provider_id, e);
                    diagnostics.record_rejection(provider_id, e.to_string());
                    continue;
                }
            };
            series.truncate_to_last(self.config.max_series_candles);

            let series = Arc::new(series);
            self.cache.set(
                CacheKey::series(pair, period, timeframe),
                CachedValue::Series(Arc::clone(&series)),
                ttl,
            );
            diagnostics.record_success(provider_id);
            return Some(series);
        }
        None
    }

    fn degraded_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
        key: &CacheKey,
        diagnostics: &mut FetchDiagnostics,
    ) -> Arc<Series> {
        if self.config.serve_stale {
            if let Lookup::Stale(series) | Lookup::Fresh(series) = self
                .cache
                .get_best_effort(key)
                .map(CachedValue::into_series)
            {
                warn!("Serving stale series for {} from '{}'", pair, series.source);
                diagnostics.set_origin(DataOrigin::StaleCache);
                return series;
            }
        }

        match self.synthetic.series(pair, period, timeframe, Utc::now()) {
            Some(series) => {
                info!(
                    "Serving synthetic series for {} ({} candles)",
                    pair,
                    series.len()
                );
                let series = Arc::new(series);
                self.cache.set(
                    key.clone(),
                    CachedValue::Series(Arc::clone(&series)),
                    self.cache.config().fallback_ttl,
                );
                diagnostics.set_origin(DataOrigin::Synthetic);
                series
            }
            None => {
                warn!("No series available for {}: {}", pair, diagnostics.summary());
                Arc::new(Series::empty(pair.clone(), timeframe))
            }
        }
    }

    // ------------------------------------------------------------------
    // Provider selection
    // ------------------------------------------------------------------

    /// Providers able to serve `operation` for `pair`, in preference order.
    /// Ineligible providers are recorded as skipped.
    fn eligible_providers(
        &self,
        pair: &Pair,
        operation: Operation,
        diagnostics: &mut FetchDiagnostics,
    ) -> Vec<&Arc<dyn MarketDataProvider>> {
        let mut eligible = Vec::new();

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());
            let caps = provider.capabilities();

            if !caps.serves(pair.asset_class) {
                diagnostics.record_skip(provider_id, SkipReason::AssetClassMismatch);
                continue;
            }
            match operation {
                Operation::Quote if !caps.supports_quotes => {
                    diagnostics.record_skip(provider_id, SkipReason::QuoteNotSupported);
                    continue;
                }
                Operation::Series if !caps.supports_series => {
                    diagnostics.record_skip(provider_id, SkipReason::SeriesNotSupported);
                    continue;
                }
                _ => {}
            }
            if !provider.has_credentials() {
                diagnostics.record_skip(provider_id, SkipReason::MissingApiKey);
                continue;
            }

            eligible.push(provider);
        }

        self.sort_by_preference(&mut eligible);
        eligible
    }

    fn record_emergency_skips(
        &self,
        pair: &Pair,
        operation: Operation,
        diagnostics: &mut FetchDiagnostics,
    ) {
        let mut scratch = FetchDiagnostics::new();
        for provider in self.eligible_providers(pair, operation, &mut scratch) {
            diagnostics.record_skip(Cow::Borrowed(provider.id()), SkipReason::EmergencyMode);
        }
    }

    /// Custom priorities first, then the provider's own priority.
    fn sort_by_preference(&self, providers: &mut [&Arc<dyn MarketDataProvider>]) {
        providers.sort_by_key(|p| {
            self.custom_priorities
                .get(p.id())
                .copied()
                .unwrap_or_else(|| p.priority() as i32)
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::models::{catalog, AssetClass, Candle, DataQuality, FALLBACK_SOURCE};
    use crate::provider::{PricePoint, ProviderCapabilities};
    use crate::registry::{GovernorConfig, ProviderQuota, ValidatorConfig};

    #[derive(Clone, Copy)]
    enum Behavior {
        Price(f64),
        Fail,
        Hang,
        /// Answers with the price after a short delay.
        Slow(f64),
    }

    struct MockProvider {
        id: &'static str,
        priority: u8,
        classes: &'static [AssetClass],
        behavior: Mutex<Behavior>,
        hourly_limit: u32,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &'static str, priority: u8, behavior: Behavior) -> Self {
            Self {
                id,
                priority,
                classes: &[AssetClass::Forex, AssetClass::Crypto],
                behavior: Mutex::new(behavior),
                hourly_limit: 1_000,
                call_count: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn set(&self, behavior: Behavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        fn current(&self) -> Behavior {
            *self.behavior.lock().unwrap()
        }

        fn failure(&self) -> MarketDataError {
            MarketDataError::ProviderUnavailable {
                provider: self.id.to_string(),
                message: "Mock failure".to_string(),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                asset_classes: self.classes,
                supports_quotes: true,
                supports_series: true,
                requires_api_key: false,
            }
        }

        fn quota(&self) -> ProviderQuota {
            ProviderQuota {
                hourly_limit: self.hourly_limit,
                daily_limit: 10_000,
                pacing: Duration::ZERO,
            }
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn fetch_quote(&self, _pair: &Pair) -> Result<PricePoint, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.current() {
                Behavior::Price(p) => Ok(PricePoint::new(p, Some(Utc::now()))),
                Behavior::Fail => Err(self.failure()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(PricePoint::new(1.0850, None))
                }
                Behavior::Slow(p) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(PricePoint::new(p, Some(Utc::now())))
                }
            }
        }

        async fn fetch_series(
            &self,
            _pair: &Pair,
            _period: Period,
            _timeframe: Timeframe,
        ) -> Result<Vec<Candle>, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let Behavior::Price(p) = self.current() else {
                return Err(self.failure());
            };
            let start = Utc::now() - chrono::Duration::hours(30);
            Ok((0..30)
                .map(|i| {
                    let ts = start + chrono::Duration::hours(i);
                    Candle::new(ts, p, p * 1.001, p * 0.999, p, 100.0)
                })
                .collect())
        }
    }

    fn orchestrator(providers: Vec<Arc<dyn MarketDataProvider>>) -> AcquisitionOrchestrator {
        orchestrator_with(providers, GovernorConfig::default(), CacheConfig::default())
    }

    fn orchestrator_with(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        governor: GovernorConfig,
        cache: CacheConfig,
    ) -> AcquisitionOrchestrator {
        let validator = ValidatorConfig {
            check_sessions: false,
            ..ValidatorConfig::default()
        };
        AcquisitionOrchestrator::new(
            providers,
            Arc::new(RateGovernor::with_config(governor)),
            Arc::new(MarketCache::with_config(cache)),
            Arc::new(PriceValidator::with_config(validator)),
        )
    }

    fn eurusd() -> Pair {
        catalog::lookup("EURUSD").unwrap()
    }

    #[tokio::test]
    async fn test_first_provider_wins_and_is_cached() {
        let primary = Arc::new(MockProvider::new("PRIMARY", 1, Behavior::Price(1.0850)));
        let backup = Arc::new(MockProvider::new("BACKUP", 2, Behavior::Price(1.0851)));
        let orch = orchestrator(vec![backup.clone(), primary.clone()]);

        let quote = orch.validated_quote(&eurusd()).await.unwrap();
        assert_eq!(quote.price(), 1.0850);
        assert_eq!(quote.source(), "PRIMARY");
        assert_eq!(quote.quality, DataQuality::High);
        assert_eq!(backup.calls(), 0);

        let again = orch.current_price(&eurusd()).await.unwrap();
        assert_eq!(again, 1.0850);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let broken = Arc::new(MockProvider::new("BROKEN", 1, Behavior::Fail));
        let backup = Arc::new(MockProvider::new("BACKUP", 2, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![broken.clone(), backup.clone()]);

        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&eurusd()).await;
        assert_eq!(result.unwrap().source(), "BACKUP");
        assert_eq!(diagnostics.errors().len(), 1);
        assert_eq!(
            diagnostics.origin,
            Some(DataOrigin::Provider("BACKUP".to_string()))
        );
    }

    #[tokio::test]
    async fn test_rejected_quote_tries_next_provider() {
        let wild = Arc::new(MockProvider::new("WILD", 1, Behavior::Price(2.5)));
        let sane = Arc::new(MockProvider::new("SANE", 2, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![wild.clone(), sane.clone()]);

        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&eurusd()).await;
        assert_eq!(result.unwrap().source(), "SANE");
        assert!(diagnostics.summary().contains("WILD: REJECTED"));
    }

    #[tokio::test]
    async fn test_all_providers_fail_returns_fallback() {
        let a = Arc::new(MockProvider::new("A", 1, Behavior::Fail));
        let b = Arc::new(MockProvider::new("B", 2, Behavior::Fail));
        let orch = orchestrator(vec![a, b]);

        let quote = orch.validated_quote(&eurusd()).await.unwrap();
        assert_eq!(quote.source(), FALLBACK_SOURCE);
        assert_eq!(quote.quality, DataQuality::Synthetic);
        let profile = eurusd().profile().unwrap();
        assert!((quote.price() - profile.base_price).abs() / profile.base_price <= 0.0051);
    }

    #[tokio::test]
    async fn test_fallback_is_cached_briefly() {
        let a = Arc::new(MockProvider::new("A", 1, Behavior::Fail));
        let orch = orchestrator(vec![a.clone()]);

        let first = orch.current_price(&eurusd()).await.unwrap();
        let second = orch.current_price(&eurusd()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_pair_without_providers_is_no_data() {
        let orch = orchestrator(Vec::new());
        let pair = Pair::custom("ABC", "XYZ", AssetClass::Forex);
        let err = orch.current_price(&pair).await.unwrap_err();
        assert!(matches!(err, MarketDataError::NoDataAvailable { .. }));
    }

    #[tokio::test]
    async fn test_asset_class_filtering() {
        let mut forex_only = MockProvider::new("FX_ONLY", 1, Behavior::Price(65_000.0));
        forex_only.classes = &[AssetClass::Forex];
        let forex_only = Arc::new(forex_only);
        let crypto = Arc::new(MockProvider::new("CRYPTO", 2, Behavior::Price(65_000.0)));
        let orch = orchestrator(vec![forex_only.clone(), crypto.clone()]);

        let btc = catalog::lookup("BTCUSD").unwrap();
        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&btc).await;
        assert_eq!(result.unwrap().source(), "CRYPTO");
        assert_eq!(forex_only.calls(), 0);
        assert_eq!(diagnostics.skip_reasons().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_skips_provider() {
        let mut limited = MockProvider::new("LIMITED", 1, Behavior::Price(1.0850));
        limited.hourly_limit = 1;
        let limited = Arc::new(limited);
        let backup = Arc::new(MockProvider::new("BACKUP", 2, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![limited.clone(), backup.clone()]);

        orch.current_price(&eurusd()).await.unwrap();
        orch.cache().clear();
        let quote = orch.validated_quote(&eurusd()).await.unwrap();

        assert_eq!(quote.source(), "BACKUP");
        assert_eq!(limited.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_respect_quota() {
        let mut limited = MockProvider::new("LIMITED", 1, Behavior::Slow(1.0850));
        limited.hourly_limit = 1;
        let limited = Arc::new(limited);
        let orch = Arc::new(orchestrator(vec![limited.clone()]));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                orch.validated_quote(&eurusd()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(limited.calls(), 1);
        let status = orch.governor().status();
        let usage = status
            .providers
            .iter()
            .find(|p| p.provider == "LIMITED")
            .unwrap();
        assert_eq!(usage.hourly_count, 1);
        assert_eq!(usage.total_requests, 1);
        assert_eq!(status.global.total_requests, 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let slow = Arc::new(MockProvider::new("SLOW", 1, Behavior::Hang));
        let fast = Arc::new(MockProvider::new("FAST", 2, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![slow, fast]);

        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&eurusd()).await;
        assert_eq!(result.unwrap().source(), "FAST");
        assert!(diagnostics.errors()[0].1.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_emergency_mode_bypasses_providers() {
        let provider = Arc::new(MockProvider::new("P", 1, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![provider.clone()]);
        orch.governor().trip_emergency("test");

        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&eurusd()).await;
        assert!(result.unwrap().is_fallback());
        assert_eq!(provider.calls(), 0);
        assert_eq!(
            diagnostics.skip_reasons()[0].1,
            &SkipReason::EmergencyMode
        );
    }

    #[tokio::test]
    async fn test_stale_quote_served_when_providers_fail() {
        let provider = Arc::new(MockProvider::new("P", 1, Behavior::Price(1.0850)));
        let cache = CacheConfig {
            quote_ttl: Duration::from_millis(20),
            ..CacheConfig::default()
        };
        let orch = orchestrator_with(vec![provider.clone()], GovernorConfig::default(), cache);

        orch.current_price(&eurusd()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        provider.set(Behavior::Fail);

        let (result, diagnostics) = orch.fetch_quote_with_diagnostics(&eurusd()).await;
        let quote = result.unwrap();
        assert!(quote.stale);
        assert_eq!(quote.quality, DataQuality::Stale);
        assert_eq!(quote.source(), "P");
        assert_eq!(diagnostics.origin, Some(DataOrigin::StaleCache));
    }

    #[tokio::test]
    async fn test_custom_priorities_override_defaults() {
        let a = Arc::new(MockProvider::new("A", 1, Behavior::Price(1.0850)));
        let b = Arc::new(MockProvider::new("B", 2, Behavior::Price(1.0850)));
        let mut priorities = HashMap::new();
        priorities.insert("B".to_string(), 0);
        let orch = orchestrator(vec![a.clone(), b.clone()]).with_priorities(priorities);

        let quote = orch.validated_quote(&eurusd()).await.unwrap();
        assert_eq!(quote.source(), "B");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_series_from_provider_and_cache() {
        let provider = Arc::new(MockProvider::new("P", 1, Behavior::Price(1.0850)));
        let orch = orchestrator(vec![provider.clone()]);

        let series = orch
            .historical_series(&eurusd(), Period::D5, Timeframe::H1)
            .await;
        assert_eq!(series.len(), 30);
        assert_eq!(series.source, "P");

        let cached = orch
            .historical_series(&eurusd(), Period::D5, Timeframe::H1)
            .await;
        assert!(Arc::ptr_eq(&series, &cached));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_series_falls_back_to_synthetic() {
        let provider = Arc::new(MockProvider::new("P", 1, Behavior::Fail));
        let orch = orchestrator(vec![provider]);

        let (series, diagnostics) = orch
            .fetch_series_with_diagnostics(&eurusd(), Period::D5, Timeframe::H1)
            .await;
        assert!(series.is_synthetic());
        assert_eq!(series.len(), 120);
        assert_eq!(diagnostics.origin, Some(DataOrigin::Synthetic));
    }

    #[tokio::test]
    async fn test_series_out_of_range_rejected() {
        let wild = Arc::new(MockProvider::new("WILD", 1, Behavior::Price(9.0)));
        let orch = orchestrator(vec![wild]);

        let (series, diagnostics) = orch
            .fetch_series_with_diagnostics(&eurusd(), Period::D5, Timeframe::H1)
            .await;
        assert!(series.is_synthetic());
        assert!(diagnostics.summary().contains("WILD: REJECTED"));
    }

    #[tokio::test]
    async fn test_unknown_pair_series_is_empty() {
        let orch = orchestrator(Vec::new());
        let pair = Pair::custom("ABC", "XYZ", AssetClass::Forex);
        let series = orch
            .historical_series(&pair, Period::Mo1, Timeframe::D1)
            .await;
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_failures_trip_emergency() {
        let governor = GovernorConfig {
            emergency: crate::registry::EmergencyConfig {
                failure_threshold: 2,
                ..Default::default()
            },
            ..GovernorConfig::default()
        };
        let a = Arc::new(MockProvider::new("A", 1, Behavior::Fail));
        let b = Arc::new(MockProvider::new("B", 2, Behavior::Fail));
        let orch = orchestrator_with(vec![a, b], governor, CacheConfig::default());

        orch.current_price(&eurusd()).await.unwrap();
        assert!(orch.governor().is_emergency());
        assert!(orch.governor().emergency_status().active);
    }
}
