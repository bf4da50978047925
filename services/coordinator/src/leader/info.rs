//! Leader identity published to the coordination tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Identity of a leader candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderInfo {
    pub host: String,
    pub port: u16,
    pub is_leader: bool,
    pub version: String,
    pub elected_at: DateTime<Utc>,
}

impl LeaderInfo {
    /// Leader info for this replica, stamped now.
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.leader_host.clone(),
            port: config.leader_port,
            is_leader: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            elected_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
