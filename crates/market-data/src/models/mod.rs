//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId, Currency, Symbol)
//! - `pair` - Currency/crypto pairs and the static pair catalog
//! - `quote` - Single price observations and validated quotes
//! - `candle` - OHLCV candles, timeframes, periods and series

mod candle;
mod pair;
mod quote;
mod types;

pub use candle::{Candle, Period, Series, Timeframe};
pub use pair::{catalog, AssetClass, Pair, PairProfile};
pub use quote::{DataQuality, Quote, ValidatedQuote, FALLBACK_SOURCE};
pub use types::{Currency, ProviderId, Symbol};
