use std::sync::Arc;

use async_trait::async_trait;
use fxpulse_analysis::{FundamentalVector, IndicatorSnapshot, Signal};
use fxpulse_market_data::{
    EmergencyStatus, GovernorStatus, Pair, Period, Series, Timeframe, ValidatedQuote,
};

use crate::batch::BatchReport;
use crate::errors::Result;

/// Operations exposed to the web and push layers.
#[async_trait]
pub trait SignalServiceTrait: Send + Sync {
    /// Current price, falling back to synthetic data. Fails only with
    /// `NoDataAvailable`.
    async fn current_price(&self, pair: &Pair) -> Result<f64>;

    /// Current price with confidence, quality label and warnings.
    async fn validated_quote(&self, pair: &Pair) -> Result<ValidatedQuote>;

    /// Historical candles; possibly empty.
    async fn historical_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Arc<Series>>;

    fn analyze(&self, pair: &Pair, series: &Series, timeframe: Timeframe) -> IndicatorSnapshot;

    fn fuse_signal(
        &self,
        pair: &Pair,
        series: &Series,
        snapshot: &IndicatorSnapshot,
        fundamental: &FundamentalVector,
    ) -> Signal;

    /// Series, snapshot, fundamentals and fusion for one pair.
    async fn signal_for_pair(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Signal>;

    fn governor_status(&self) -> GovernorStatus;

    fn emergency_status(&self) -> EmergencyStatus;

    fn reset_emergency(&self);

    fn trip_emergency(&self, reason: &str);

    async fn fetch_prices(&self, pairs: &[Pair]) -> BatchReport<ValidatedQuote>;

    async fn fetch_signals(
        &self,
        pairs: &[Pair],
        period: Period,
        timeframe: Timeframe,
    ) -> BatchReport<Signal>;
}
