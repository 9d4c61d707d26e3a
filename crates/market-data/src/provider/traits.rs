//! Market data provider trait definitions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::MarketDataError;
use crate::models::{Candle, Pair, Period, Timeframe};
use crate::registry::ProviderQuota;

use super::capabilities::ProviderCapabilities;

/// Per-call timeout used when a provider doesn't declare one.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// A raw price as returned by a provider, before validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    /// Provider-reported observation time, when the endpoint exposes one
    pub timestamp: Option<DateTime<Utc>>,
}

impl PricePoint {
    pub fn new(price: f64, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { price, timestamp }
    }
}

/// Trait for market data providers.
///
/// The orchestrator uses `capabilities()` and `priority()` to decide whether
/// and in which order a provider is called, and `quota()` to configure the
/// rate governor. Providers never retry; failover is the orchestrator's job.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use fxpulse_market_data::provider::{MarketDataProvider, PricePoint, ProviderCapabilities};
///
/// struct StaticProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for StaticProvider {
///     fn id(&self) -> &'static str {
///         "STATIC"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             asset_classes: &[AssetClass::Forex],
///             supports_quotes: true,
///             supports_series: false,
///             requires_api_key: false,
///         }
///     }
///
///     async fn fetch_quote(&self, _pair: &Pair) -> Result<PricePoint, MarketDataError> {
///         Ok(PricePoint::new(1.0850, None))
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier such as "YAHOO" or "BINANCE".
    ///
    /// Used for logging, quota accounting and diagnostics.
    fn id(&self) -> &'static str;

    /// Lower values are tried first. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    fn capabilities(&self) -> ProviderCapabilities;

    /// Request budget applied by the rate governor.
    fn quota(&self) -> ProviderQuota {
        ProviderQuota::default()
    }

    /// Hard deadline for a single call.
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }

    /// False when the provider needs a key that isn't configured.
    fn has_credentials(&self) -> bool {
        true
    }

    /// Fetch the latest price for a pair.
    async fn fetch_quote(&self, pair: &Pair) -> Result<PricePoint, MarketDataError>;

    /// Fetch historical candles covering `period` at `timeframe` resolution.
    ///
    /// Candles need not be sorted; the caller normalizes them.
    /// Default implementation returns `NotSupported`.
    async fn fetch_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let _ = (pair, period, timeframe);
        Err(MarketDataError::NotSupported {
            operation: "series".to_string(),
            provider: self.id().to_string(),
        })
    }
}
