//! End-to-end tests of the signal service over mock providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fxpulse_analysis::{FundamentalVector, TrendDirection};
use fxpulse_core::{
    BatchConfig, BatchOutcome, Error, FundamentalAnalyzer, MarketContext, PersistedRecord,
    PersistenceSink, Settings, SignalService, SignalServiceTrait, StaticFundamentalAnalyzer,
};
use fxpulse_market_data::{
    catalog, AssetClass, Candle, MarketDataError, MarketDataProvider, Pair, Period, PricePoint,
    ProviderCapabilities, ProviderQuota, Timeframe, FALLBACK_SOURCE,
};

// =============================================================================
// Mocks
// =============================================================================

#[derive(Clone, Copy)]
enum Behavior {
    /// Quote at the pair's catalog base price, rising series ending there.
    Healthy,
    Fail,
}

struct MockProvider {
    behavior: Behavior,
    /// Symbols whose requests never finish.
    hang_on: &'static [&'static str],
    call_count: AtomicUsize,
}

impl MockProvider {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            hang_on: &[],
            call_count: AtomicUsize::new(0),
        }
    }

    fn hanging_on(mut self, symbols: &'static [&'static str]) -> Self {
        self.hang_on = symbols;
        self
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn enter(&self, pair: &Pair) -> Result<f64, MarketDataError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.hang_on.contains(&pair.symbol.as_ref()) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        match self.behavior {
            Behavior::Healthy => Ok(pair.profile().map(|p| p.base_price).unwrap_or(1.0)),
            Behavior::Fail => Err(MarketDataError::ProviderUnavailable {
                provider: "MOCK".to_string(),
                message: "Mock failure".to_string(),
            }),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_classes: &[AssetClass::Forex, AssetClass::Crypto],
            supports_quotes: true,
            supports_series: true,
            requires_api_key: false,
        }
    }

    fn quota(&self) -> ProviderQuota {
        ProviderQuota {
            hourly_limit: 10_000,
            daily_limit: 10_000,
            pacing: Duration::ZERO,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn fetch_quote(&self, pair: &Pair) -> Result<PricePoint, MarketDataError> {
        let price = self.enter(pair).await?;
        Ok(PricePoint::new(price, Some(Utc::now())))
    }

    async fn fetch_series(
        &self,
        pair: &Pair,
        _period: Period,
        _timeframe: Timeframe,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let last = self.enter(pair).await?;
        let step = last * 0.0005;
        let start = Utc::now() - chrono::Duration::hours(60);
        Ok((0..60)
            .map(|i| {
                let close = last - step * f64::from(59 - i);
                let open = close - step;
                Candle::new(
                    start + chrono::Duration::hours(i64::from(i)),
                    open,
                    close + step * 0.3,
                    open - step * 0.3,
                    close,
                    1_000.0,
                )
            })
            .collect())
    }
}

#[derive(Default)]
struct RecordingSink {
    series: AtomicUsize,
    signals: AtomicUsize,
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn store(&self, _pair: &Pair, record: PersistedRecord) -> fxpulse_core::Result<()> {
        match record {
            PersistedRecord::Series(_) => self.series.fetch_add(1, Ordering::SeqCst),
            PersistedRecord::Signal(_) => self.signals.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn store(&self, _pair: &Pair, _record: PersistedRecord) -> fxpulse_core::Result<()> {
        Err(Error::Persistence("disk full".to_string()))
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl FundamentalAnalyzer for BrokenAnalyzer {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn analyze(&self, _pair: &Pair) -> fxpulse_core::Result<FundamentalVector> {
        Err(Error::Fundamental("feed offline".to_string()))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn settings() -> Settings {
    Settings {
        check_sessions: false,
        ..Settings::default()
    }
}

fn service(provider: Arc<MockProvider>) -> SignalService {
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![provider];
    let context = MarketContext::with_providers(settings(), providers).unwrap();
    SignalService::new(Arc::new(context))
}

fn pair(symbol: &str) -> Pair {
    catalog::lookup(symbol).unwrap()
}

async fn wait_for(counter: &AtomicUsize, at_least: usize) {
    for _ in 0..100 {
        if counter.load(Ordering::SeqCst) >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Prices
// =============================================================================

#[tokio::test]
async fn test_current_price_from_provider() {
    let provider = Arc::new(MockProvider::new(Behavior::Healthy));
    let service = service(provider.clone());

    let quote = service.validated_quote(&pair("EURUSD")).await.unwrap();
    assert_eq!(quote.price(), 1.0850);
    assert_eq!(quote.source(), "MOCK");
    assert!(quote.confidence <= 100);

    // second call is served from cache
    assert_eq!(service.current_price(&pair("EURUSD")).await.unwrap(), 1.0850);
    assert_eq!(provider.calls(), 1);
    assert_eq!(service.governor_status().global.total_requests, 1);
}

#[tokio::test]
async fn test_all_providers_failing_serves_fallback() {
    let provider = Arc::new(MockProvider::new(Behavior::Fail));
    let service = service(provider.clone());

    let quote = service.validated_quote(&pair("GBPUSD")).await.unwrap();
    assert_eq!(quote.source(), FALLBACK_SOURCE);
    assert!(quote.price() > 1.0 && quote.price() < 2.0);
    assert!(provider.calls() >= 1);
}

#[tokio::test]
async fn test_emergency_mode_bypasses_providers() {
    let provider = Arc::new(MockProvider::new(Behavior::Healthy));
    let service = service(provider.clone());

    service.trip_emergency("manual test");
    assert!(service.emergency_status().active);

    let quote = service.validated_quote(&pair("EURUSD")).await.unwrap();
    assert_eq!(quote.source(), FALLBACK_SOURCE);
    assert_eq!(provider.calls(), 0);

    service.reset_emergency();
    assert!(!service.emergency_status().active);
    service.context().cache().clear();
    let quote = service.validated_quote(&pair("EURUSD")).await.unwrap();
    assert_eq!(quote.source(), "MOCK");
}

#[tokio::test]
async fn test_closed_context_rejects_requests() {
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)));
    service.context().shutdown();

    let err = service.current_price(&pair("EURUSD")).await.unwrap_err();
    assert!(matches!(err, Error::ContextClosed));
}

// =============================================================================
// Signals
// =============================================================================

#[tokio::test]
async fn test_rising_series_snapshot_is_bullish() {
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)));
    let eurusd = pair("EURUSD");

    let series = service
        .historical_series(&eurusd, Period::D5, Timeframe::H1)
        .await
        .unwrap();
    assert_eq!(series.len(), 60);

    let snapshot = service.analyze(&eurusd, &series, Timeframe::H1);
    assert!(!snapshot.insufficient_data);
    assert_eq!(snapshot.trend.direction, TrendDirection::Bullish);

    let signal = service.fuse_signal(&eurusd, &series, &snapshot, &FundamentalVector::neutral());
    assert_eq!(signal.symbol, "EURUSD");
    assert!((0.0..=100.0).contains(&signal.confidence));
    assert!((signal.levels.entry - 1.085).abs() < 1e-9);
}

#[tokio::test]
async fn test_signal_for_pair_persists_series_and_signal() {
    let sink = Arc::new(RecordingSink::default());
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)))
        .with_persistence(sink.clone())
        .with_fundamentals(Arc::new(
            StaticFundamentalAnalyzer::new().with_view("EURUSD", FundamentalVector::bullish(70.0)),
        ));

    let signal = service
        .signal_for_pair(&pair("EURUSD"), Period::D5, Timeframe::H1)
        .await
        .unwrap();
    assert!(signal.valid_until > signal.timestamp);
    assert_eq!(signal.fundamental.confidence, 70.0);

    wait_for(&sink.series, 1).await;
    wait_for(&sink.signals, 1).await;
    assert_eq!(sink.series.load(Ordering::SeqCst), 1);
    assert_eq!(sink.signals.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_collaborator_failures_do_not_affect_signals() {
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)))
        .with_persistence(Arc::new(FailingSink))
        .with_fundamentals(Arc::new(BrokenAnalyzer));

    let signal = service
        .signal_for_pair(&pair("BTCUSD"), Period::D5, Timeframe::H1)
        .await
        .unwrap();
    assert_eq!(signal.fundamental.confidence, 0.0);
    assert!((0.0..=100.0).contains(&signal.confidence));
}

#[tokio::test]
async fn test_signal_without_providers_uses_synthetic_series() {
    let service = service(Arc::new(MockProvider::new(Behavior::Fail)));

    let signal = service
        .signal_for_pair(&pair("USDJPY"), Period::D5, Timeframe::H1)
        .await
        .unwrap();
    assert_eq!(signal.symbol, "USDJPY");
    assert!(signal.levels.entry > 80.0 && signal.levels.entry < 160.0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_fetch_prices_reports_each_pair() {
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)));
    let pairs = vec![pair("EURUSD"), pair("GBPUSD"), pair("ETHUSD")];

    let report = service.fetch_prices(&pairs).await;
    assert_eq!(report.fetched_count(), 3);
    assert!(!report.deadline_hit);
    let eth = report.get("ETHUSD").and_then(BatchOutcome::value).unwrap();
    assert_eq!(eth.price(), 3_200.0);
}

#[tokio::test]
async fn test_batch_deadline_leaves_slow_pairs_pending() {
    let provider = Arc::new(MockProvider::new(Behavior::Healthy).hanging_on(&["GBPUSD"]));
    let service = service(provider).with_batch_config(BatchConfig {
        max_concurrency: 4,
        deadline: Duration::from_millis(300),
    });

    let report = service.fetch_prices(&[pair("EURUSD"), pair("GBPUSD")]).await;
    assert!(report.deadline_hit);
    assert!(report.get("EURUSD").unwrap().is_fetched());
    assert_eq!(report.get("GBPUSD"), Some(&BatchOutcome::Pending));
}

#[tokio::test]
async fn test_fetch_signals_batch() {
    let service = service(Arc::new(MockProvider::new(Behavior::Healthy)));
    let pairs = vec![pair("EURUSD"), pair("SOLUSD")];

    let report = service.fetch_signals(&pairs, Period::D5, Timeframe::H1).await;
    assert_eq!(report.fetched_count(), 2);
    for (symbol, signal) in report.fetched() {
        assert_eq!(signal.symbol, symbol);
    }
}
