use std::sync::Arc;

use async_trait::async_trait;
use fxpulse_analysis::Signal;
use fxpulse_market_data::{Pair, Series};

use crate::errors::Result;

/// What the pipeline hands to persistence.
#[derive(Debug, Clone)]
pub enum PersistedRecord {
    Series(Arc<Series>),
    Signal(Arc<Signal>),
}

impl PersistedRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Series(_) => "series",
            Self::Signal(_) => "signal",
        }
    }
}

/// Fire-and-forget storage of fetched series and generated signals.
///
/// Results never depend on it: failures are logged by the caller and
/// dropped.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn store(&self, pair: &Pair, record: PersistedRecord) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistence;

#[async_trait]
impl PersistenceSink for NoopPersistence {
    async fn store(&self, _pair: &Pair, _record: PersistedRecord) -> Result<()> {
        Ok(())
    }
}
