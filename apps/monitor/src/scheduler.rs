//! Periodic price and signal refresh.

use std::sync::Arc;

use fxpulse_core::{BatchOutcome, SignalService, SignalServiceTrait};
use fxpulse_market_data::Pair;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Spawn the refresh loop. The first tick runs immediately.
pub fn start_refresh_scheduler(service: Arc<SignalService>, config: &Config) -> JoinHandle<()> {
    let settings = &config.settings;
    let pairs = settings.resolved_pairs();
    let every = settings.refresh_interval();
    let with_signals = config.signals;

    tokio::spawn(async move {
        info!("Refresh scheduler started ({}s interval)", every.as_secs());
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_refresh(&service, &pairs, with_signals).await;
        }
    })
}

/// One refresh: batch prices, then optionally batch signals.
pub async fn run_refresh(service: &SignalService, pairs: &[Pair], with_signals: bool) {
    if pairs.is_empty() {
        warn!("No valid pairs configured; nothing to refresh");
        return;
    }

    let prices = service.fetch_prices(pairs).await;
    for item in &prices.items {
        match &item.outcome {
            BatchOutcome::Fetched(quote) => info!(
                symbol = %item.symbol,
                price = quote.price(),
                confidence = quote.confidence,
                source = %quote.source(),
                stale = quote.stale,
                "quote"
            ),
            BatchOutcome::Failed(reason) => warn!(symbol = %item.symbol, %reason, "quote failed"),
            BatchOutcome::Pending => {
                warn!(symbol = %item.symbol, "quote still pending at deadline")
            }
        }
    }

    if with_signals {
        let settings = service.context().settings();
        let signals = service
            .fetch_signals(pairs, settings.period, settings.timeframe)
            .await;
        for item in &signals.items {
            match &item.outcome {
                BatchOutcome::Fetched(signal) => info!(
                    symbol = %item.symbol,
                    direction = %signal.direction,
                    confidence = signal.confidence,
                    entry = signal.levels.entry,
                    stop_loss = ?signal.levels.stop_loss,
                    take_profit = ?signal.levels.take_profit_1,
                    risk = %signal.risk.risk_level,
                    position_pct = signal.position.recommended_percent,
                    "signal"
                ),
                BatchOutcome::Failed(reason) => {
                    warn!(symbol = %item.symbol, %reason, "signal failed")
                }
                BatchOutcome::Pending => {
                    warn!(symbol = %item.symbol, "signal still pending at deadline")
                }
            }
        }
    }

    let status = service.governor_status();
    let purged = service.context().housekeeping();
    debug!(
        "Governor health {} ({:?}), {} request(s) this hour, {} expired cache entries purged",
        status.health.score, status.health.status, status.global.hourly_count, purged
    );
    if status.emergency.active {
        warn!("Emergency mode active: {}", status.emergency.message);
    }
}
