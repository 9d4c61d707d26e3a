//! Core error types for FxPulse.
//!
//! Provider-level failures never get this far: the acquisition orchestrator
//! absorbs them. What remains are terminal data exhaustion, configuration
//! problems and collaborator failures.

use fxpulse_analysis::AnalysisError;
use fxpulse_market_data::MarketDataError;
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the core facade.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Fundamental analysis failed: {0}")]
    Fundamental(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Market context has been shut down")]
    ContextClosed,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigIO(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigIO(err.to_string())
    }
}

impl Error {
    /// True for `NoDataAvailable`, the only terminal data failure.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            Error::MarketData(MarketDataError::NoDataAvailable { .. })
        )
    }
}
