use anyhow::{Context, Result};
use clap::Parser;
use regalia_relay::{
    config::{Cli, RelayConfig},
    relay::RelayHandle,
    snapshot::SnapshotCache,
    telemetry::Telemetry,
    AppState,
};
use tokio::{net::TcpListener, signal};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = Telemetry::init()?;
    let config = RelayConfig::from(Cli::parse());

    let (relay, relay_task) = RelayHandle::spawn(SnapshotCache::new());
    let state = AppState::new(relay).with_metrics(telemetry.metrics_handle());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %config.listen_addr, "regalia relay listening");

    regalia_relay::serve(listener, state, shutdown_signal()).await?;

    info!(
        grace_seconds = config.shutdown_grace.as_secs(),
        "shutdown signal received; draining"
    );
    tokio::time::sleep(config.shutdown_grace).await;
    relay_task.abort();
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
