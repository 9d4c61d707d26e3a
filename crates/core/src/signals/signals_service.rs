use std::sync::Arc;

use async_trait::async_trait;
use fxpulse_analysis::{
    FundamentalVector, IndicatorSnapshot, Signal, SignalFusionEngine, TechnicalAnalyzer,
};
use fxpulse_market_data::{
    EmergencyStatus, GovernorStatus, Pair, Period, Series, Timeframe, ValidatedQuote,
};
use log::{debug, info, warn};

use super::signals_traits::SignalServiceTrait;
use crate::batch::{run_batch, BatchConfig, BatchReport};
use crate::collaborators::{
    FundamentalAnalyzer, NeutralFundamentalAnalyzer, NoopPersistence, PersistedRecord,
    PersistenceSink,
};
use crate::context::MarketContext;
use crate::errors::Result;

/// Everything a single pair task needs; cheap to clone into spawned tasks.
#[derive(Clone)]
struct Pipeline {
    context: Arc<MarketContext>,
    analyzer: Arc<TechnicalAnalyzer>,
    fusion: Arc<SignalFusionEngine>,
    fundamentals: Arc<dyn FundamentalAnalyzer>,
    persistence: Arc<dyn PersistenceSink>,
}

impl Pipeline {
    async fn quote(&self, pair: &Pair) -> Result<ValidatedQuote> {
        self.context.ensure_open()?;
        Ok(self.context.orchestrator().validated_quote(pair).await?)
    }

    async fn series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Arc<Series>> {
        self.context.ensure_open()?;
        Ok(self
            .context
            .orchestrator()
            .historical_series(pair, period, timeframe)
            .await)
    }

    fn analyze(&self, pair: &Pair, series: &Series, timeframe: Timeframe) -> IndicatorSnapshot {
        if series.timeframe != timeframe {
            debug!(
                "Analyzing {} series at {} although {} was requested",
                pair,
                series.timeframe.as_str(),
                timeframe.as_str()
            );
        }
        self.analyzer.analyze(series)
    }

    /// Neutral when the analyzer fails.
    async fn fundamentals(&self, pair: &Pair) -> FundamentalVector {
        match self.fundamentals.analyze(pair).await {
            Ok(view) => view,
            Err(e) => {
                warn!(
                    "Fundamental analyzer '{}' failed for {}: {}. Using a neutral view.",
                    self.fundamentals.name(),
                    pair,
                    e
                );
                FundamentalVector::neutral()
            }
        }
    }

    async fn signal(&self, pair: &Pair, period: Period, timeframe: Timeframe) -> Result<Signal> {
        let series = self.series(pair, period, timeframe).await?;
        if !series.is_empty() {
            self.persist(pair, PersistedRecord::Series(Arc::clone(&series)));
        }

        let snapshot = self.analyze(pair, &series, timeframe);
        let fundamental = self.fundamentals(pair).await;
        let signal = self.fusion.generate(pair, &series, &snapshot, &fundamental);

        self.persist(pair, PersistedRecord::Signal(Arc::new(signal.clone())));
        Ok(signal)
    }

    /// Fire-and-forget; failures are logged and dropped.
    fn persist(&self, pair: &Pair, record: PersistedRecord) {
        let sink = Arc::clone(&self.persistence);
        let pair = pair.clone();
        tokio::spawn(async move {
            let kind = record.kind();
            if let Err(e) = sink.store(&pair, record).await {
                warn!("Failed to persist {} for {}: {}", kind, pair, e);
            }
        });
    }
}

/// Default [`SignalServiceTrait`] implementation over a [`MarketContext`].
pub struct SignalService {
    pipeline: Pipeline,
    batch: BatchConfig,
}

impl SignalService {
    /// Service with a neutral fundamental analyzer and no persistence.
    pub fn new(context: Arc<MarketContext>) -> Self {
        let settings = context.settings();
        let analyzer = TechnicalAnalyzer::new(settings.indicator_config());
        let fusion = SignalFusionEngine::new(settings.fusion_config());
        let batch = BatchConfig {
            max_concurrency: settings.batch_concurrency,
            deadline: settings.batch_deadline(),
        };

        Self {
            pipeline: Pipeline {
                context,
                analyzer: Arc::new(analyzer),
                fusion: Arc::new(fusion),
                fundamentals: Arc::new(NeutralFundamentalAnalyzer),
                persistence: Arc::new(NoopPersistence),
            },
            batch,
        }
    }

    pub fn with_fundamentals(mut self, analyzer: Arc<dyn FundamentalAnalyzer>) -> Self {
        info!("Using fundamental analyzer '{}'", analyzer.name());
        self.pipeline.fundamentals = analyzer;
        self
    }

    pub fn with_persistence(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.pipeline.persistence = sink;
        self
    }

    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn context(&self) -> &Arc<MarketContext> {
        &self.pipeline.context
    }

    pub fn batch_config(&self) -> BatchConfig {
        self.batch
    }
}

#[async_trait]
impl SignalServiceTrait for SignalService {
    async fn current_price(&self, pair: &Pair) -> Result<f64> {
        self.pipeline.quote(pair).await.map(|q| q.price())
    }

    async fn validated_quote(&self, pair: &Pair) -> Result<ValidatedQuote> {
        self.pipeline.quote(pair).await
    }

    async fn historical_series(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Arc<Series>> {
        self.pipeline.series(pair, period, timeframe).await
    }

    fn analyze(&self, pair: &Pair, series: &Series, timeframe: Timeframe) -> IndicatorSnapshot {
        self.pipeline.analyze(pair, series, timeframe)
    }

    fn fuse_signal(
        &self,
        pair: &Pair,
        series: &Series,
        snapshot: &IndicatorSnapshot,
        fundamental: &FundamentalVector,
    ) -> Signal {
        self.pipeline
            .fusion
            .generate(pair, series, snapshot, fundamental)
    }

    async fn signal_for_pair(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
    ) -> Result<Signal> {
        self.pipeline.signal(pair, period, timeframe).await
    }

    fn governor_status(&self) -> GovernorStatus {
        self.pipeline.context.governor().status()
    }

    fn emergency_status(&self) -> EmergencyStatus {
        self.pipeline.context.governor().emergency_status()
    }

    fn reset_emergency(&self) {
        info!("Emergency mode reset requested");
        self.pipeline.context.governor().reset_emergency();
    }

    fn trip_emergency(&self, reason: &str) {
        self.pipeline.context.governor().trip_emergency(reason);
    }

    async fn fetch_prices(&self, pairs: &[Pair]) -> BatchReport<ValidatedQuote> {
        let pipeline = self.pipeline.clone();
        run_batch(pairs, self.batch, move |pair| {
            let pipeline = pipeline.clone();
            async move { pipeline.quote(&pair).await }
        })
        .await
    }

    async fn fetch_signals(
        &self,
        pairs: &[Pair],
        period: Period,
        timeframe: Timeframe,
    ) -> BatchReport<Signal> {
        let pipeline = self.pipeline.clone();
        run_batch(pairs, self.batch, move |pair| {
            let pipeline = pipeline.clone();
            async move { pipeline.signal(&pair, period, timeframe).await }
        })
        .await
    }
}
