//! Provider capabilities.
//!
//! Describes what a provider can serve so the orchestrator can skip it
//! without making a call. Request budgets live in
//! [`ProviderQuota`](crate::registry::ProviderQuota).

use crate::models::AssetClass;

/// Describes the capabilities of a market data provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Asset classes this provider serves.
    pub asset_classes: &'static [AssetClass],

    /// Whether the provider has a latest-price endpoint.
    pub supports_quotes: bool,

    /// Whether the provider has a historical candle endpoint.
    pub supports_series: bool,

    /// Whether calls need an API key.
    pub requires_api_key: bool,
}

impl ProviderCapabilities {
    pub fn serves(&self, asset_class: AssetClass) -> bool {
        self.asset_classes.contains(&asset_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serves_asset_class() {
        let caps = ProviderCapabilities {
            asset_classes: &[AssetClass::Crypto],
            supports_quotes: true,
            supports_series: false,
            requires_api_key: false,
        };
        assert!(caps.serves(AssetClass::Crypto));
        assert!(!caps.serves(AssetClass::Forex));
    }
}
