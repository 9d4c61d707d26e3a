//! FxPulse Market Data Crate
//!
//! Resilient price acquisition for currency and crypto pairs: several
//! unreliable, rate-limited upstream providers behind one orchestrator that
//! validates, caches and, when everything else fails, synthesizes data.
//!
//! # Architecture
//!
//! ```text
//!                 +------------------+
//!   caller  --->  |   Orchestrator   | ---> MarketCache (fresh / stale)
//!                 +------------------+
//!                          |
//!              +-----------+-----------+
//!              v                       v
//!      +---------------+       +----------------+
//!      | RateGovernor  |       | Provider table |  (Yahoo, Binance, ...)
//!      | + emergency   |       +----------------+
//!      +---------------+               |
//!                                      v
//!                             +----------------+
//!                             | PriceValidator |  (confidence 0-100)
//!                             +----------------+
//!                                      |
//!                      rejected / failed everywhere
//!                                      v
//!                           +--------------------+
//!                           | SyntheticGenerator |  (seeded, deterministic)
//!                           +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Pair`] - Catalog pair with asset class and currencies
//! - [`Quote`] / [`ValidatedQuote`] - Single price observations
//! - [`Candle`] / [`Series`] - Historical OHLCV data
//! - [`AcquisitionOrchestrator`] - Cache, failover and fallback pipeline
//! - [`RateGovernor`] - Request budgets and emergency breaker
//! - [`PriceValidator`] - Plausibility scoring
//! - [`MarketCache`] - TTL store with a best-effort stale area

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod synthetic;

// Re-export all public types from models
pub use models::{
    catalog, AssetClass, Candle, Currency, DataQuality, Pair, PairProfile, Period, ProviderId,
    Quote, Series, Symbol, Timeframe, ValidatedQuote, FALLBACK_SOURCE,
};

pub use cache::{CacheConfig, CacheKey, CacheStats, CachedValue, DataKind, Lookup, MarketCache};
pub use errors::{MarketDataError, RetryClass};

// Re-export provider types
pub use provider::{
    default_client, default_providers, MarketDataProvider, PricePoint, ProviderCapabilities,
    ProviderOptions, ProviderSpec, TableProvider,
};

// Re-export registry types
pub use registry::{
    AcquisitionOrchestrator, DataOrigin, EmergencyConfig, EmergencyStatus, FetchDiagnostics,
    GovernorConfig, GovernorStatus, HealthStatus, OrchestratorConfig, PriceValidator,
    ProviderAttempt, ProviderQuota, RateGovernor, SkipReason, ValidationResult, ValidatorConfig,
    DEFAULT_MIN_CONFIDENCE,
};

pub use synthetic::{SyntheticConfig, SyntheticGenerator};
