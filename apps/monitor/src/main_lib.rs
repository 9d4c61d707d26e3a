use std::sync::Arc;

use fxpulse_core::{MarketContext, SignalService};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_service(config: &Config) -> anyhow::Result<Arc<SignalService>> {
    let context = Arc::new(MarketContext::new(config.settings.clone())?);
    tracing::info!(
        "Tracking {} pair(s) at {} over {}",
        config.settings.pairs.len(),
        config.settings.timeframe.as_str(),
        config.settings.period.as_str()
    );
    Ok(Arc::new(SignalService::new(context)))
}
