use std::env;

use fxpulse_core::Settings;

/// Process configuration: the library settings plus binary-only switches.
pub struct Config {
    pub settings: Settings,
    /// `json` or `text`.
    pub log_format: String,
    /// Compute signals on every refresh, not only prices.
    pub signals: bool,
    /// Run one refresh and exit.
    pub once: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let log_format = env::var("FXPULSE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        let signals = env::var("FXPULSE_SIGNALS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);
        let once = env::var("FXPULSE_ONCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);
        let settings = Settings::from_env()?;
        Ok(Self {
            settings,
            log_format,
            signals,
            once,
        })
    }
}
