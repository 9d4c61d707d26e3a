use std::collections::HashMap;

use async_trait::async_trait;
use fxpulse_analysis::FundamentalVector;
use fxpulse_market_data::Pair;

use crate::errors::Result;

/// External fundamental view of a pair.
///
/// Implementations are opaque heuristics; the core only consumes the
/// direction and confidence they return.
#[async_trait]
pub trait FundamentalAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, pair: &Pair) -> Result<FundamentalVector>;
}

/// Always neutral: HOLD with zero confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralFundamentalAnalyzer;

#[async_trait]
impl FundamentalAnalyzer for NeutralFundamentalAnalyzer {
    fn name(&self) -> &'static str {
        "neutral"
    }

    async fn analyze(&self, _pair: &Pair) -> Result<FundamentalVector> {
        Ok(FundamentalVector::neutral())
    }
}

/// Fixed per-symbol views, neutral for everything else.
#[derive(Debug, Clone, Default)]
pub struct StaticFundamentalAnalyzer {
    views: HashMap<String, FundamentalVector>,
}

impl StaticFundamentalAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, symbol: &str, view: FundamentalVector) -> Self {
        self.views.insert(symbol.to_uppercase(), view);
        self
    }
}

#[async_trait]
impl FundamentalAnalyzer for StaticFundamentalAnalyzer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn analyze(&self, pair: &Pair) -> Result<FundamentalVector> {
        Ok(self
            .views
            .get(pair.symbol.as_ref())
            .copied()
            .unwrap_or_else(FundamentalVector::neutral))
    }
}
