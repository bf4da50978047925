//! Configuration for the supervisor.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tempest_id::NodeId;

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Node id this supervisor serves.
    pub node_id: NodeId,

    /// Address to listen on for assignment pushes.
    pub listen_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let node_id = std::env::var("TEMPEST_SUPERVISOR_ID")
            .context("TEMPEST_SUPERVISOR_ID is required")?;
        let node_id = NodeId::parse(&node_id).context("TEMPEST_SUPERVISOR_ID is not a valid node id")?;

        let listen_addr = std::env::var("TEMPEST_SUPERVISOR_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:6628".to_string())
            .parse()
            .context("TEMPEST_SUPERVISOR_LISTEN_ADDR must be a socket address")?;

        let log_level = std::env::var("TEMPEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            node_id,
            listen_addr,
            log_level,
        })
    }
}
