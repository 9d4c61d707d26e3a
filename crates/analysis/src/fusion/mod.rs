//! Signal fusion.
//!
//! - **Model** (`model.rs`) - Direction, technical/fundamental vectors, Signal
//! - **Engine** (`engine.rs`) - Weighted blend, agreement bonus, important-level override
//! - **Risk** (`risk.rs`) - Volatility tier, stop/target levels, position size, summary text

mod engine;
mod model;
pub mod risk;

pub use engine::{FusionConfig, SignalFusionEngine, TechnicalWeights};
pub use model::{
    ComponentSignal, Direction, FundamentalVector, FusionOutcome, PositionSizing, RiskLevel,
    RiskMetrics, Signal, SignalQuality, SignalSummary, TechnicalVector, TradeLevels,
};
pub use risk::RiskConfig;
