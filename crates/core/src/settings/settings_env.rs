//! `FXPULSE_*` environment overrides.

use std::env;
use std::str::FromStr;

use fxpulse_market_data::provider::PROVIDER_TABLE;
use log::warn;

use super::Settings;
use crate::errors::Result;

pub const ENV_PREFIX: &str = "FXPULSE_";

impl Settings {
    /// Settings from the process environment.
    ///
    /// Starts from the JSON file named by `FXPULSE_CONFIG` when set, then
    /// applies the individual `FXPULSE_*` variables and provider keys such as
    /// `ALPHA_VANTAGE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base = match env::var("FXPULSE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Settings::from_json_file(path.trim())?,
            _ => Settings::default(),
        };
        let settings = apply_env_overrides(base, |key| env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }
}

/// Apply overrides read through `lookup`. Unparseable values are logged and
/// ignored.
pub fn apply_env_overrides<F>(mut settings: Settings, lookup: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(&format!("{}{}", ENV_PREFIX, name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(pairs) = var("PAIRS") {
        settings.pairs = split_list(&pairs);
    }
    if let Some(disabled) = var("DISABLED_PROVIDERS") {
        settings.disabled_providers = split_list(&disabled);
    }

    parse_into(var("PERIOD"), "PERIOD", &mut settings.period);
    parse_into(var("TIMEFRAME"), "TIMEFRAME", &mut settings.timeframe);
    parse_into(var("REFRESH_SECS"), "REFRESH_SECS", &mut settings.refresh_secs);
    parse_into(
        var("BATCH_CONCURRENCY"),
        "BATCH_CONCURRENCY",
        &mut settings.batch_concurrency,
    );
    parse_into(
        var("BATCH_DEADLINE_SECS"),
        "BATCH_DEADLINE_SECS",
        &mut settings.batch_deadline_secs,
    );
    parse_into(
        var("GLOBAL_HOURLY_LIMIT"),
        "GLOBAL_HOURLY_LIMIT",
        &mut settings.global_hourly_limit,
    );
    parse_into(
        var("GLOBAL_DAILY_LIMIT"),
        "GLOBAL_DAILY_LIMIT",
        &mut settings.global_daily_limit,
    );
    parse_into(
        var("EMERGENCY_THRESHOLD"),
        "EMERGENCY_THRESHOLD",
        &mut settings.emergency_failure_threshold,
    );
    parse_into(
        var("EMERGENCY_WINDOW_SECS"),
        "EMERGENCY_WINDOW_SECS",
        &mut settings.emergency_window_secs,
    );
    parse_into(
        var("EMERGENCY_COOLDOWN_SECS"),
        "EMERGENCY_COOLDOWN_SECS",
        &mut settings.emergency_cooldown_secs,
    );
    parse_into(var("MIN_CONFIDENCE"), "MIN_CONFIDENCE", &mut settings.min_confidence);
    parse_into(var("CHECK_SESSIONS"), "CHECK_SESSIONS", &mut settings.check_sessions);
    parse_into(var("SERVE_STALE"), "SERVE_STALE", &mut settings.serve_stale);

    for spec in PROVIDER_TABLE.iter().filter(|s| s.requires_api_key) {
        let key_var = format!("{}_API_KEY", spec.id);
        if let Some(key) = lookup(&key_var).filter(|k| !k.trim().is_empty()) {
            settings
                .api_keys
                .insert(spec.id.to_string(), key.trim().to_string());
        }
    }

    settings
}

fn parse_into<T: FromStr>(raw: Option<String>, name: &str, target: &mut T) {
    if let Some(raw) = raw {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}{}='{}': not a valid value", ENV_PREFIX, name, raw),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
