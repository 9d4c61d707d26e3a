//! FxPulse Analysis Crate
//!
//! Pure, synchronous analytics on top of [`fxpulse_market_data`] series:
//!
//! - [`TechnicalAnalyzer`] turns a candle [`Series`](fxpulse_market_data::Series)
//!   into an [`IndicatorSnapshot`] (trend vote, oscillators, bands, ATR,
//!   volume, support/resistance, important levels, candlestick patterns).
//! - [`SignalFusionEngine`] blends the technical picture with an externally
//!   supplied [`FundamentalVector`] into a trade [`Signal`] carrying
//!   confidence, risk tier, stop/target levels and position sizing.
//!
//! Nothing here holds shared state, so both engines can run in parallel
//! across pairs without coordination.
//!
//! ```text
//! Series --> TechnicalAnalyzer --> IndicatorSnapshot --> TechnicalVector --+
//!                                                                          +--> SignalFusionEngine --> Signal
//!                                       FundamentalAnalyzer (external) ----+
//! ```

pub mod errors;
pub mod fusion;
pub mod indicators;
pub mod snapshot;

pub use errors::{AnalysisError, Result};
pub use fusion::{
    ComponentSignal, Direction, FundamentalVector, FusionConfig, FusionOutcome, PositionSizing,
    RiskConfig, RiskLevel, RiskMetrics, Signal, SignalFusionEngine, SignalQuality, SignalSummary,
    TechnicalVector, TechnicalWeights, TradeLevels,
};
pub use indicators::{
    BandPosition, CandlePattern, DetectedPattern, OscillatorLabel, PatternBias, SupportResistance,
    TrendDirection, VolumeLabel,
};
pub use snapshot::{
    BollingerReading, IndicatorConfig, IndicatorSnapshot, MacdReading, MomentumReading,
    MovingAverageAlignment, OscillatorReading, StochasticReading, SummaryLabel, TechnicalAnalyzer,
    TechnicalSummary, TrendReading, VolatilityReading, VolumeReading,
};
