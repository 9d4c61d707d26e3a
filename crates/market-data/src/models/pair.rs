use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{Currency, Symbol};
use crate::errors::MarketDataError;

/// Asset classification for a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    #[default]
    Forex,
    Crypto,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forex => write!(f, "FOREX"),
            Self::Crypto => write!(f, "CRYPTO"),
        }
    }
}

/// A tradeable pair, e.g. EUR/USD or BTC/USD.
///
/// Pairs are normally obtained from the static [`catalog`]; [`Pair::custom`]
/// exists for pairs outside the catalog (they get no range check and no
/// synthetic fallback).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub symbol: Symbol,
    pub asset_class: AssetClass,
    pub base: Currency,
    pub quote: Currency,
}

impl Pair {
    /// Build a pair outside the catalog.
    pub fn custom(base: &str, quote: &str, asset_class: AssetClass) -> Self {
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        Self {
            symbol: Cow::Owned(format!("{}{}", base, quote)),
            asset_class,
            base: Cow::Owned(base),
            quote: Cow::Owned(quote),
        }
    }

    /// Resolve a symbol against the catalog.
    ///
    /// Accepts `EURUSD`, `eur/usd`, `EUR_USD`, `EUR-USD` and Yahoo-style `EURUSD=X`.
    pub fn from_symbol(symbol: &str) -> Result<Self, MarketDataError> {
        catalog::lookup(symbol).ok_or_else(|| MarketDataError::UnknownPair(symbol.to_string()))
    }

    pub fn is_crypto(&self) -> bool {
        self.asset_class == AssetClass::Crypto
    }

    /// JPY-quoted pairs trade with a different decimal convention.
    pub fn is_jpy(&self) -> bool {
        self.quote == "JPY"
    }

    /// Catalog profile for this pair, if it is a catalog pair.
    pub fn profile(&self) -> Option<&'static PairProfile> {
        catalog::profile(&self.symbol)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Static facts about a catalog pair.
#[derive(Clone, Copy, Debug)]
pub struct PairProfile {
    pub symbol: &'static str,
    pub asset_class: AssetClass,
    pub base: &'static str,
    pub quote: &'static str,
    /// Lower bound of a plausible price
    pub min_price: f64,
    /// Upper bound of a plausible price
    pub max_price: f64,
    /// Anchor used by the synthetic generator
    pub base_price: f64,
    /// Conventional number of decimals for quotes
    pub decimals: u32,
}

impl PairProfile {
    pub fn pair(&self) -> Pair {
        Pair {
            symbol: Cow::Borrowed(self.symbol),
            asset_class: self.asset_class,
            base: Cow::Borrowed(self.base),
            quote: Cow::Borrowed(self.quote),
        }
    }
}

pub mod catalog {
    //! Static pair catalog.

    use super::{AssetClass, Pair, PairProfile};

    const fn forex(
        symbol: &'static str,
        base: &'static str,
        quote: &'static str,
        min_price: f64,
        max_price: f64,
        base_price: f64,
        decimals: u32,
    ) -> PairProfile {
        PairProfile {
            symbol,
            asset_class: AssetClass::Forex,
            base,
            quote,
            min_price,
            max_price,
            base_price,
            decimals,
        }
    }

    const fn crypto(
        symbol: &'static str,
        base: &'static str,
        min_price: f64,
        max_price: f64,
        base_price: f64,
        decimals: u32,
    ) -> PairProfile {
        PairProfile {
            symbol,
            asset_class: AssetClass::Crypto,
            base,
            quote: "USD",
            min_price,
            max_price,
            base_price,
            decimals,
        }
    }

    static PAIRS: [PairProfile; 15] = [
        forex("EURUSD", "EUR", "USD", 0.8, 1.5, 1.0850, 5),
        forex("GBPUSD", "GBP", "USD", 1.0, 2.0, 1.2650, 5),
        forex("USDJPY", "USD", "JPY", 80.0, 160.0, 149.50, 3),
        forex("USDCHF", "USD", "CHF", 0.7, 1.2, 0.8750, 5),
        forex("AUDUSD", "AUD", "USD", 0.5, 1.1, 0.6650, 5),
        forex("USDCAD", "USD", "CAD", 1.0, 1.6, 1.3580, 5),
        forex("NZDUSD", "NZD", "USD", 0.4, 0.9, 0.6150, 5),
        forex("EURGBP", "EUR", "GBP", 0.7, 1.0, 0.8580, 5),
        forex("EURJPY", "EUR", "JPY", 100.0, 200.0, 162.20, 3),
        forex("GBPJPY", "GBP", "JPY", 120.0, 230.0, 189.10, 3),
        crypto("BTCUSD", "BTC", 1_000.0, 500_000.0, 65_000.0, 2),
        crypto("ETHUSD", "ETH", 50.0, 50_000.0, 3_200.0, 2),
        crypto("XRPUSD", "XRP", 0.05, 50.0, 0.55, 5),
        crypto("LTCUSD", "LTC", 5.0, 2_000.0, 80.0, 2),
        crypto("SOLUSD", "SOL", 1.0, 5_000.0, 150.0, 3),
    ];

    /// All catalog profiles.
    pub fn all() -> &'static [PairProfile] {
        &PAIRS
    }

    /// Catalog pairs of one asset class.
    pub fn pairs(asset_class: AssetClass) -> impl Iterator<Item = Pair> {
        PAIRS
            .iter()
            .filter(move |p| p.asset_class == asset_class)
            .map(PairProfile::pair)
    }

    pub fn profile(symbol: &str) -> Option<&'static PairProfile> {
        let normalized = normalize(symbol);
        PAIRS.iter().find(|p| p.symbol == normalized)
    }

    pub fn lookup(symbol: &str) -> Option<Pair> {
        profile(symbol).map(PairProfile::pair)
    }

    fn normalize(symbol: &str) -> String {
        let upper = symbol.trim().to_uppercase();
        let upper = upper.strip_suffix("=X").unwrap_or(&upper);
        upper
            .chars()
            .filter(|c| !matches!(c, '/' | '_' | '-' | ' '))
            .collect()
    }
}
