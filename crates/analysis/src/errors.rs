//! Error types for indicator computation.

use thiserror::Error;

/// Errors raised by the strict analysis entry points.
///
/// The lenient paths ([`TechnicalAnalyzer::analyze`](crate::TechnicalAnalyzer::analyze))
/// never return these; they fall back to a neutral snapshot instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Series too short for indicator computation.
    #[error("Insufficient series length: need {required}, got {actual}")]
    InsufficientSeriesLength { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
