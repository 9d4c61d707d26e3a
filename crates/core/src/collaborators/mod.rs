//! Capability interfaces the pipeline consumes, with named no-op
//! implementations supplied at construction time.

mod fundamentals;
mod persistence;

pub use fundamentals::{FundamentalAnalyzer, NeutralFundamentalAnalyzer, StaticFundamentalAnalyzer};
pub use persistence::{NoopPersistence, PersistedRecord, PersistenceSink};
