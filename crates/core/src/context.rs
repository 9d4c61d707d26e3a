//! Per-process market context.
//!
//! One `MarketContext` owns the shared acquisition state (rate governor,
//! cache, validator memory) and the orchestrator that uses it. Everything
//! that needs that state receives the context explicitly; there are no
//! module-level singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fxpulse_market_data::{
    default_client, default_providers, AcquisitionOrchestrator, MarketCache, MarketDataProvider,
    PriceValidator, RateGovernor, SyntheticGenerator,
};
use log::info;

use crate::errors::{Error, Result};
use crate::settings::Settings;

pub struct MarketContext {
    settings: Settings,
    orchestrator: Arc<AcquisitionOrchestrator>,
    closed: AtomicBool,
}

impl MarketContext {
    /// Build the context with the default HTTP provider table.
    pub fn new(settings: Settings) -> Result<Self> {
        let providers = default_providers(default_client(), &settings.provider_options());
        Self::with_providers(settings, providers)
    }

    /// Build the context over an explicit provider list.
    pub fn with_providers(
        settings: Settings,
        providers: Vec<Arc<dyn MarketDataProvider>>,
    ) -> Result<Self> {
        settings.validate()?;

        let governor = Arc::new(RateGovernor::with_config(settings.governor_config()));
        let cache = Arc::new(MarketCache::with_config(settings.cache_config()));
        let validator = Arc::new(PriceValidator::with_config(settings.validator_config()));

        let provider_ids: Vec<&'static str> = providers.iter().map(|p| p.id()).collect();
        let orchestrator =
            AcquisitionOrchestrator::new(providers, governor, cache, validator)
                .with_config(settings.orchestrator_config())
                .with_synthetic(SyntheticGenerator::new(settings.synthetic_config()))
                .with_priorities(settings.priority_overrides());

        info!(
            "Market context ready: {} provider(s) [{}], {} tracked pair(s)",
            provider_ids.len(),
            provider_ids.join(", "),
            settings.pairs.len()
        );

        Ok(Self {
            settings,
            orchestrator: Arc::new(orchestrator),
            closed: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &Arc<AcquisitionOrchestrator> {
        &self.orchestrator
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        self.orchestrator.governor()
    }

    pub fn cache(&self) -> &Arc<MarketCache> {
        self.orchestrator.cache()
    }

    pub fn validator(&self) -> &Arc<PriceValidator> {
        self.orchestrator.validator()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::ContextClosed)
        } else {
            Ok(())
        }
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn housekeeping(&self) -> usize {
        self.cache().purge_expired()
    }

    /// Tear the context down: log final usage, drop cached data and the
    /// validator's price memory. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let status = self.governor().status();
        let cache = self.cache().stats();
        info!(
            "Market context shutting down: {} request(s) total, health {} ({:?}), cache hits {} / misses {}",
            status.global.total_requests,
            status.health.score,
            status.health.status,
            cache.hits,
            cache.misses
        );
        self.cache().clear();
        self.validator().reset();
    }
}

impl std::fmt::Debug for MarketContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketContext")
            .field("providers", &self.orchestrator.providers().len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_default_table() {
        let context = MarketContext::new(Settings::default()).unwrap();
        assert!(!context.orchestrator().providers().is_empty());
        assert!(!context.governor().is_emergency());
    }

    #[test]
    fn test_disabled_providers_are_left_out() {
        let all = MarketContext::new(Settings::default()).unwrap();
        let settings = Settings {
            disabled_providers: vec!["yahoo".to_string(), "BINANCE".to_string()],
            ..Settings::default()
        };
        let fewer = MarketContext::new(settings).unwrap();
        assert_eq!(
            fewer.orchestrator().providers().len() + 2,
            all.orchestrator().providers().len()
        );
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let settings = Settings {
            batch_concurrency: 0,
            ..Settings::default()
        };
        assert!(MarketContext::with_providers(settings, Vec::new()).is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let context = MarketContext::with_providers(Settings::default(), Vec::new()).unwrap();
        assert!(context.ensure_open().is_ok());
        context.shutdown();
        context.shutdown();
        assert!(context.is_closed());
        assert!(matches!(context.ensure_open(), Err(Error::ContextClosed)));
        assert!(context.cache().is_empty());
    }
}
