//! FxPulse Core - the process-level facade.
//!
//! This crate wires the acquisition pipeline (`fxpulse-market-data`) and the
//! analysis engines (`fxpulse-analysis`) into one service:
//! - [`Settings`] - flat configuration from JSON and `FXPULSE_*` variables
//! - [`MarketContext`] - shared governor, cache and validator with init/teardown
//! - [`SignalService`] - price, series, snapshot and signal operations
//! - [`run_batch`] - bounded, deadline-limited fan-out over pairs
//! - Collaborator traits for fundamentals and persistence, with no-op defaults

pub mod batch;
pub mod collaborators;
pub mod context;
pub mod errors;
pub mod settings;
pub mod signals;

pub use batch::{run_batch, BatchConfig, BatchItem, BatchOutcome, BatchReport};
pub use collaborators::{
    FundamentalAnalyzer, NeutralFundamentalAnalyzer, NoopPersistence, PersistedRecord,
    PersistenceSink, StaticFundamentalAnalyzer,
};
pub use context::MarketContext;
pub use settings::Settings;
pub use signals::{SignalService, SignalServiceTrait};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
