use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pair::Pair;

/// Source tag carried by synthesized quotes and series.
pub const FALLBACK_SOURCE: &str = "fallback";

/// A single price observation from one source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub pair: Pair,

    /// Mid/last price
    pub price: f64,

    /// Source of the quote (YAHOO, BINANCE, fallback, etc.)
    pub source: String,

    /// Timestamp reported by the source, or fetch time when the source has none
    pub timestamp: DateTime<Utc>,

    /// Confidence assigned by the validator (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

impl Quote {
    pub fn new(
        pair: Pair,
        price: f64,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            pair,
            price,
            source: source.into(),
            timestamp,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FALLBACK_SOURCE
    }
}

/// Quality label attached to quotes handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQuality {
    High,
    Medium,
    Low,
    /// Expired cache data served during degraded operation
    Stale,
    /// Deterministic fallback data
    Synthetic,
}

impl DataQuality {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            90..=u8::MAX => Self::High,
            70..=89 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Stale => "STALE",
            Self::Synthetic => "SYNTHETIC",
        };
        write!(f, "{}", label)
    }
}

/// Quote returned to callers together with its validation outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatedQuote {
    pub quote: Quote,
    pub confidence: u8,
    pub quality: DataQuality,
    pub warnings: Vec<String>,
    /// True when this is expired data served as best-effort
    #[serde(default)]
    pub stale: bool,
}

impl ValidatedQuote {
    /// Wrap a quote the validator accepted.
    pub fn accepted(quote: Quote, confidence: u8, warnings: Vec<String>) -> Self {
        Self {
            quote: quote.with_confidence(confidence),
            confidence,
            quality: DataQuality::from_confidence(confidence),
            warnings,
            stale: false,
        }
    }

    /// Wrap a synthesized quote. Confidence is left at zero.
    pub fn synthetic(quote: Quote) -> Self {
        Self {
            quote,
            confidence: 0,
            quality: DataQuality::Synthetic,
            warnings: vec!["Synthetic fallback price; no provider data available".to_string()],
            stale: false,
        }
    }

    /// Re-label an expired entry for best-effort serving.
    pub fn into_stale(mut self) -> Self {
        self.stale = true;
        self.quality = DataQuality::Stale;
        self.warnings.push(format!(
            "Stale data from {} served during degraded operation",
            self.quote.source
        ));
        self
    }

    pub fn price(&self) -> f64 {
        self.quote.price
    }

    pub fn source(&self) -> &str {
        &self.quote.source
    }

    pub fn is_fallback(&self) -> bool {
        self.quote.is_fallback()
    }
}
