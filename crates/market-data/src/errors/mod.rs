//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Provider-level variants never reach callers of the orchestrator; they are
/// caught, logged and recorded in fetch diagnostics. Only
/// [`NoDataAvailable`](Self::NoDataAvailable) and request errors such as
/// [`UnknownPair`](Self::UnknownPair) propagate.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Network, timeout or HTTP failure from one source.
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable {
        /// The provider that failed
        provider: String,
        /// What went wrong
        message: String,
    },

    /// The per-call timeout elapsed before the provider answered.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// Local quota exhausted; the request was not sent.
    #[error("Rate limit exceeded: {provider}")]
    RateLimitExceeded {
        /// The provider whose quota is exhausted
        provider: String,
    },

    /// The validator rejected the data a provider returned.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// All providers and the synthetic fallback were exhausted.
    #[error("No data available for {pair}")]
    NoDataAvailable {
        /// The pair that could not be priced
        pair: String,
    },

    /// Series too short for indicator computation.
    #[error("Insufficient series length: need {required}, got {actual}")]
    InsufficientSeriesLength {
        /// Minimum candles required
        required: usize,
        /// Candles supplied
        actual: usize,
    },

    /// Emergency mode is active; providers are not being called.
    #[error("Emergency mode active")]
    EmergencyModeActive,

    /// Response body could not be interpreted.
    #[error("Parse error: {provider} - {message}")]
    Parse {
        /// The provider whose response was malformed
        provider: String,
        /// Parser message
        message: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by provider '{provider}'")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that doesn't support it
        provider: String,
    },

    /// The provider needs an API key that was not configured.
    #[error("Missing API key for provider: {provider}")]
    MissingApiKey {
        /// The provider lacking a key
        provider: String,
    },

    /// The symbol is not in the pair catalog.
    #[error("Unknown pair: {0}")]
    UnknownPair(String),

    #[error("Unsupported timeframe: {0}")]
    UnsupportedTimeframe(String),

    #[error("Unsupported period: {0}")]
    UnsupportedPeriod(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the failover classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use fxpulse_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = MarketDataError::UnknownPair("FOOBAR".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::UnknownPair(_)
            | Self::UnsupportedTimeframe(_)
            | Self::UnsupportedPeriod(_)
            | Self::NoDataAvailable { .. }
            | Self::InsufficientSeriesLength { .. } => RetryClass::Never,

            // The request went out and failed
            Self::ProviderUnavailable { .. }
            | Self::Timeout { .. }
            | Self::Parse { .. }
            | Self::Network(_) => RetryClass::FailoverWithPenalty,

            Self::RateLimitExceeded { .. }
            | Self::ValidationFailed { .. }
            | Self::NotSupported { .. }
            | Self::MissingApiKey { .. } => RetryClass::NextProvider,

            Self::EmergencyModeActive => RetryClass::Degraded,
        }
    }

    /// Whether a request was actually sent to the provider.
    pub fn counts_as_request(&self) -> bool {
        self.retry_class() == RetryClass::FailoverWithPenalty
    }
}
