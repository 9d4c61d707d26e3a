//! Generic HTTP provider that executes a [`ProviderSpec`] table entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::capabilities::ProviderCapabilities;
use super::table::{ProviderSpec, PROVIDER_TABLE};
use super::traits::{MarketDataProvider, PricePoint};
use crate::errors::MarketDataError;
use crate::models::{Candle, Pair, Period, Timeframe};
use crate::registry::ProviderQuota;

/// Upper bound on any request; per-provider deadlines are tighter and
/// enforced by the orchestrator.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by every table provider.
pub fn default_client() -> Client {
    Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .user_agent(concat!("fxpulse/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// A provider backed by one table entry.
pub struct TableProvider {
    spec: &'static ProviderSpec,
    client: Client,
    api_key: Option<String>,
    priority: u8,
}

impl TableProvider {
    pub fn new(spec: &'static ProviderSpec, client: Client, api_key: Option<String>) -> Self {
        Self {
            spec,
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            priority: spec.priority,
        }
    }

    /// Override the table priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn spec(&self) -> &'static ProviderSpec {
        self.spec
    }

    fn ensure_credentials(&self) -> Result<(), MarketDataError> {
        if self.spec.requires_api_key && self.api_key.is_none() {
            return Err(MarketDataError::MissingApiKey {
                provider: self.spec.id.to_string(),
            });
        }
        Ok(())
    }

    fn not_supported(&self, operation: &str) -> MarketDataError {
        MarketDataError::NotSupported {
            operation: operation.to_string(),
            provider: self.spec.id.to_string(),
        }
    }

    fn parse_error(&self, message: String) -> MarketDataError {
        MarketDataError::Parse {
            provider: self.spec.id.to_string(),
            message,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, MarketDataError> {
        let provider = self.spec.id;
        debug!("{}: GET {}", provider, redact(url));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: provider.to_string(),
                }
            } else {
                MarketDataError::ProviderUnavailable {
                    provider: provider.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::ProviderUnavailable {
                provider: provider.to_string(),
                message: "rate limited (HTTP 429)".to_string(),
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::ProviderUnavailable {
                provider: provider.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| self.parse_error(format!("invalid JSON body: {}", e)))
    }
}

/// Hide the API key when logging a URL.
fn redact(url: &str) -> String {
    match url.find("apikey=") {
        Some(pos) => {
            let start = pos + "apikey=".len();
            let end = url[start..]
                .find('&')
                .map(|i| start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl MarketDataProvider for TableProvider {
    fn id(&self) -> &'static str {
        self.spec.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_classes: self.spec.asset_classes,
            supports_quotes: self.spec.supports_quotes(),
            supports_series: self.spec.supports_series(),
            requires_api_key: self.spec.requires_api_key,
        }
    }

    fn quota(&self) -> ProviderQuota {
        self.spec.quota.clone()
    }

    fn timeout(&self) -> Duration {
        self.spec.timeout
    }

    fn has_credentials(&self) -> bool {
        !self.spec.requires_api_key || self.api_key.is_some()
    }

    async fn fetch_quote(&self, pair: &Pair) -> Result<PricePoint, MarketDataError> {
        self.ensure_credentials()?;
        let (Some(url), Some(parser)) = (
            self.spec.quote_url(pair, self.api_key.as_deref()),
            self.spec.quote_parser,
        ) else {
            return Err(self.not_supported("quote"));
        };

        let body = self.get_json(&url).await?;
        let point = parser(&body, pair).map_err(|msg| self.parse_error(msg))?;
        debug!("{}: {} = {}", self.spec.id, pair.symbol, point.price);
        Ok(point)
    }

    async fn fetch_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.ensure_credentials()?;
        let (Some(url), Some(parser)) = (
            self.spec
                .series_url(pair, period, timeframe, self.api_key.as_deref()),
            self.spec.series_parser,
        ) else {
            return Err(self.not_supported("series"));
        };

        let body = self.get_json(&url).await?;
        let candles = parser(&body, pair).map_err(|msg| self.parse_error(msg))?;
        debug!(
            "{}: {} candles for {} {} {}",
            self.spec.id,
            candles.len(),
            pair.symbol,
            period.as_str(),
            timeframe.as_str()
        );
        Ok(candles)
    }
}

/// Options for building the default provider chain.
#[derive(Clone, Debug, Default)]
pub struct ProviderOptions {
    /// API keys by provider id (e.g. `ALPHA_VANTAGE`).
    pub api_keys: HashMap<String, String>,
    /// Provider ids to leave out.
    pub disabled: Vec<String>,
    /// Priority overrides by provider id.
    pub priorities: HashMap<String, u8>,
}

impl ProviderOptions {
    fn is_disabled(&self, id: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(id))
    }

    fn lookup<'a, V>(map: &'a HashMap<String, V>, id: &str) -> Option<&'a V> {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(id))
            .map(|(_, v)| v)
    }
}

/// One [`TableProvider`] per enabled table entry, sharing `client`.
pub fn default_providers(
    client: Client,
    options: &ProviderOptions,
) -> Vec<Arc<dyn MarketDataProvider>> {
    PROVIDER_TABLE
        .iter()
        .copied()
        .filter(|spec| !options.is_disabled(spec.id))
        .map(|spec| {
            let key = ProviderOptions::lookup(&options.api_keys, spec.id).cloned();
            let mut provider = TableProvider::new(spec, client.clone(), key);
            if let Some(priority) = ProviderOptions::lookup(&options.priorities, spec.id) {
                provider = provider.with_priority(*priority);
            }
            Arc::new(provider) as Arc<dyn MarketDataProvider>
        })
        .collect()
}
