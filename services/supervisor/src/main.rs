//! tempest supervisor
//!
//! Receives assignment pushes from the coordinator for one worker node.

use std::sync::Arc;

use anyhow::Result;
use tempest_supervisor::{config::Config, telemetry, RunningServer, Supervisor};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    telemetry::init(&config.log_level);

    info!(node = %config.node_id, "Starting tempest supervisor");

    let supervisor = Arc::new(Supervisor::new(config.node_id.clone()));
    let server = RunningServer::spawn(config.listen_addr, supervisor.clone()).await?;
    info!(addr = %server.local_addr(), "Configuration loaded");

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    supervisor.stop();
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if tokio::time::timeout(shutdown_timeout, server.shutdown()).await.is_err() {
        tracing::warn!("Server did not shut down in time");
    }

    info!("Supervisor shutdown complete");
    Ok(())
}
