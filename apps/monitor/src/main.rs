mod config;
mod main_lib;
mod scheduler;

use config::Config;
use fxpulse_core::SignalServiceTrait;
use main_lib::{build_service, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);
    let service = build_service(&config)?;

    if config.once {
        let pairs = config.settings.resolved_pairs();
        scheduler::run_refresh(&service, &pairs, config.signals).await;
        println!("{}", serde_json::to_string_pretty(&service.governor_status())?);
        service.context().shutdown();
        return Ok(());
    }

    let refresh = scheduler::start_refresh_scheduler(service.clone(), &config);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    refresh.abort();
    service.context().shutdown();
    Ok(())
}
