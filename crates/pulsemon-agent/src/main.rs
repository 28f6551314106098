mod config;
mod poller;
mod reporter;
mod transport;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use pulsemon_common::types::Metric;

use config::AgentConfig;
use transport::Transport;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        server = %config.address,
        poll_secs = config.poll_interval_secs,
        report_secs = config.report_interval_secs,
        mode = ?config.report_mode,
        compress = ?config.compress,
        batch = config.batch,
        rate_limit = config.rate_limit,
        signed = !config.key.is_empty(),
        "agent starting"
    );

    let transport = Transport::new(&config)?;

    let (tx, rx) = mpsc::channel::<Vec<Metric>>(config.channel_capacity());
    let metric_watch = tx.downgrade();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let poll_handle = tokio::spawn(poller::run(config.clone(), tx, shutdown_rx));
    let report_handle = if config.rate_limit == 0 {
        tokio::spawn(reporter::run_single(config, transport, rx, metric_watch))
    } else {
        tokio::spawn(reporter::run_pool(config, transport, rx, metric_watch))
    };

    poll_handle.await?;
    report_handle.await?;
    tracing::info!("agent stopped");
    Ok(())
}
