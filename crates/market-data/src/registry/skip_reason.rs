//! Per-request provider attempt tracking.

use std::fmt;

use serde::Serialize;

use crate::models::ProviderId;

/// Why a provider was skipped without being called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Provider doesn't serve this asset class.
    AssetClassMismatch,

    /// Provider has no latest-quote endpoint.
    QuoteNotSupported,

    /// Provider has no historical series endpoint.
    SeriesNotSupported,

    /// Provider requires an API key and none is configured.
    MissingApiKey,

    /// The rate governor denied the request.
    RateLimited,

    /// Emergency mode active; the whole chain was bypassed.
    EmergencyMode,
}

/// Where the returned data finally came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataOrigin {
    Cache,
    Provider(String),
    StaleCache,
    Synthetic,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Provider(id) => write!(f, "provider {}", id),
            Self::StaleCache => write!(f, "stale cache"),
            Self::Synthetic => write!(f, "synthetic fallback"),
        }
    }
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug, Serialize)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    /// Data arrived but the validator rejected it
    pub rejected: Option<String>,
    pub success: bool,
}

/// Detailed trace of a fetch operation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
    pub origin: Option<DataOrigin>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, provider_id: ProviderId) -> &mut ProviderAttempt {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            rejected: None,
            success: false,
        });
        let last = self.attempts.len() - 1;
        &mut self.attempts[last]
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id).skipped = Some(reason);
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.push(provider_id).error = Some(error);
    }

    pub fn record_rejection(&mut self, provider_id: ProviderId, reason: String) {
        self.push(provider_id).rejected = Some(reason);
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.push(provider_id).success = true;
        self.origin = Some(DataOrigin::Provider(
            self.attempts[self.attempts.len() - 1].provider_id.to_string(),
        ));
    }

    pub fn set_origin(&mut self, origin: DataOrigin) {
        self.origin = Some(origin);
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else if let Some(reason) = &a.rejected {
                    format!("{}: REJECTED ({})", a.provider_id, reason)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect();
        if let Some(origin) = &self.origin {
            if !matches!(origin, DataOrigin::Provider(_)) {
                parts.push(format!("served from {}", origin));
            }
        }
        parts.join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Providers that were actually called.
    pub fn called_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.skipped.is_none()).count()
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }
}
