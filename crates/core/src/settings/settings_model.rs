//! User-facing settings and their conversion into component configs.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use fxpulse_analysis::{FusionConfig, IndicatorConfig};
use fxpulse_market_data::{
    CacheConfig, EmergencyConfig, GovernorConfig, OrchestratorConfig, Pair, Period,
    ProviderOptions, SyntheticConfig, Timeframe, ValidatorConfig, DEFAULT_MIN_CONFIDENCE,
};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Flat settings for one FxPulse process.
///
/// Missing fields take their defaults, so a JSON file only needs the keys it
/// changes. Component configs are derived with the `*_config()` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Symbols tracked by batch operations.
    pub pairs: Vec<String>,
    pub period: Period,
    pub timeframe: Timeframe,
    pub refresh_secs: u64,
    pub batch_concurrency: usize,
    pub batch_deadline_secs: u64,

    pub global_hourly_limit: u32,
    pub global_daily_limit: u32,
    /// Provider failures within `emergency_window_secs` that trip emergency mode.
    pub emergency_failure_threshold: u32,
    pub emergency_window_secs: u64,
    pub emergency_cooldown_secs: u64,

    pub quote_ttl_secs: u64,
    pub series_ttl_secs: u64,
    pub fallback_ttl_secs: u64,
    pub stale_retention_secs: u64,

    pub min_confidence: u8,
    /// Reject forex quotes stamped inside the weekend closure.
    pub check_sessions: bool,
    pub serve_stale: bool,
    pub max_series_candles: usize,

    pub disabled_providers: Vec<String>,
    pub provider_priorities: HashMap<String, u8>,
    /// API keys by provider id, e.g. `ALPHA_VANTAGE`.
    #[serde(skip_serializing)]
    pub api_keys: HashMap<String, String>,

    pub indicators: IndicatorConfig,
    pub fusion: FusionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let cache = CacheConfig::default();
        let emergency = EmergencyConfig::default();
        let governor = GovernorConfig::default();
        let orchestrator = OrchestratorConfig::default();

        Self {
            pairs: ["EURUSD", "GBPUSD", "USDJPY", "BTCUSD", "ETHUSD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            period: Period::Mo1,
            timeframe: Timeframe::H1,
            refresh_secs: 60,
            batch_concurrency: 4,
            batch_deadline_secs: 15,
            global_hourly_limit: governor.global_hourly_limit,
            global_daily_limit: governor.global_daily_limit,
            emergency_failure_threshold: emergency.failure_threshold,
            emergency_window_secs: emergency.failure_window.as_secs(),
            emergency_cooldown_secs: emergency.cooldown.as_secs(),
            quote_ttl_secs: cache.quote_ttl.as_secs(),
            series_ttl_secs: cache.series_ttl.as_secs(),
            fallback_ttl_secs: cache.fallback_ttl.as_secs(),
            stale_retention_secs: cache.stale_retention.as_secs(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            check_sessions: true,
            serve_stale: orchestrator.serve_stale,
            max_series_candles: orchestrator.max_series_candles,
            disabled_providers: Vec::new(),
            provider_priorities: HashMap::new(),
            api_keys: HashMap::new(),
            indicators: IndicatorConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_concurrency == 0 {
            return Err(Error::InvalidConfigValue(
                "batchConcurrency must be at least 1".to_string(),
            ));
        }
        if self.batch_deadline_secs == 0 {
            return Err(Error::InvalidConfigValue(
                "batchDeadlineSecs must be at least 1".to_string(),
            ));
        }
        if self.min_confidence > 100 {
            return Err(Error::InvalidConfigValue(format!(
                "minConfidence must be within 0-100, got {}",
                self.min_confidence
            )));
        }
        let weights = self.fusion.technical_weight + self.fusion.fundamental_weight;
        if !weights.is_finite() || weights <= 0.0 {
            return Err(Error::InvalidConfigValue(
                "fusion weights must sum to a positive value".to_string(),
            ));
        }
        Ok(())
    }

    /// Tracked pairs resolved against the catalog. Unknown symbols are
    /// logged and skipped.
    pub fn resolved_pairs(&self) -> Vec<Pair> {
        self.pairs
            .iter()
            .filter_map(|symbol| match Pair::from_symbol(symbol) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("Skipping configured pair '{}': {}", symbol, e);
                    None
                }
            })
            .collect()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs.max(1))
    }

    pub fn emergency_config(&self) -> EmergencyConfig {
        EmergencyConfig {
            failure_threshold: self.emergency_failure_threshold.max(1),
            failure_window: Duration::from_secs(self.emergency_window_secs),
            cooldown: Duration::from_secs(self.emergency_cooldown_secs),
        }
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            global_hourly_limit: self.global_hourly_limit,
            global_daily_limit: self.global_daily_limit,
            emergency: self.emergency_config(),
            ..GovernorConfig::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            quote_ttl: Duration::from_secs(self.quote_ttl_secs),
            series_ttl: Duration::from_secs(self.series_ttl_secs),
            fallback_ttl: Duration::from_secs(self.fallback_ttl_secs),
            stale_retention: Duration::from_secs(self.stale_retention_secs),
            ..CacheConfig::default()
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            min_confidence: self.min_confidence.min(100),
            check_sessions: self.check_sessions,
            ..ValidatorConfig::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            serve_stale: self.serve_stale,
            max_series_candles: self.max_series_candles,
        }
    }

    /// Synthetic data lives as long as a cached fallback entry.
    pub fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            max_candles: self.max_series_candles,
            ttl: Duration::from_secs(self.fallback_ttl_secs),
            ..SyntheticConfig::default()
        }
    }

    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            api_keys: self.api_keys.clone(),
            disabled: self.disabled_providers.clone(),
            priorities: self.provider_priorities.clone(),
        }
    }

    /// Priority overrides in the orchestrator's form, keyed by upper-case id.
    pub fn priority_overrides(&self) -> HashMap<String, i32> {
        self.provider_priorities
            .iter()
            .map(|(id, p)| (id.to_uppercase(), i32::from(*p)))
            .collect()
    }

    pub fn indicator_config(&self) -> IndicatorConfig {
        self.indicators.clone()
    }

    pub fn fusion_config(&self) -> FusionConfig {
        self.fusion.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let settings = Settings::default();
        let governor = settings.governor_config();
        assert_eq!(governor.global_hourly_limit, 300);
        assert_eq!(governor.global_daily_limit, 5_000);
        assert_eq!(settings.emergency_config().failure_threshold, 10);
        assert_eq!(settings.emergency_config().failure_window, Duration::from_secs(120));
        assert_eq!(settings.emergency_config().cooldown, Duration::from_secs(600));
        assert_eq!(settings.cache_config().fallback_ttl, Duration::from_secs(30));
        assert_eq!(settings.validator_config().min_confidence, DEFAULT_MIN_CONFIDENCE);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "pairs": ["eur/usd", "BTCUSD"],
            "timeframe": "4h",
            "batchConcurrency": 8,
            "fusion": { "technicalWeight": 0.7, "fundamentalWeight": 0.3 }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.timeframe, Timeframe::H4);
        assert_eq!(settings.period, Period::Mo1);
        assert_eq!(settings.batch_concurrency, 8);
        assert_eq!(settings.fusion.technical_weight, 0.7);
        assert_eq!(settings.fusion.combined_threshold, 0.15);
        assert_eq!(settings.indicators, IndicatorConfig::default());

        let symbols: Vec<String> = settings
            .resolved_pairs()
            .iter()
            .map(|p| p.symbol.to_string())
            .collect();
        assert_eq!(symbols, vec!["EURUSD", "BTCUSD"]);
    }

    #[test]
    fn test_unknown_pairs_are_skipped() {
        let settings = Settings {
            pairs: vec!["EURUSD".to_string(), "NOTAPAIR".to_string()],
            ..Settings::default()
        };
        assert_eq!(settings.resolved_pairs().len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_workers = Settings {
            batch_concurrency: 0,
            ..Settings::default()
        };
        assert!(matches!(
            zero_workers.validate(),
            Err(Error::InvalidConfigValue(_))
        ));

        let mut no_weights = Settings::default();
        no_weights.fusion.technical_weight = 0.0;
        no_weights.fusion.fundamental_weight = 0.0;
        assert!(no_weights.validate().is_err());
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let mut settings = Settings::default();
        settings
            .api_keys
            .insert("ALPHA_VANTAGE".to_string(), "secret".to_string());
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
        assert_eq!(settings.provider_options().api_keys.len(), 1);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Settings::from_json_file("/nonexistent/fxpulse.json").unwrap_err();
        assert!(matches!(err, Error::ConfigIO(_)));
    }
}
