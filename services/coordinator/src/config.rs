//! Configuration for the coordinator core.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cluster::Acl;

/// Default coordination-tree root.
pub const DEFAULT_ZOOKEEPER_ROOT: &str = "/storm";

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root path of this cluster in the coordination tree.
    pub zookeeper_root: String,

    /// Host advertised in leader info.
    pub leader_host: String,

    /// Port advertised in leader info.
    pub leader_port: u16,

    /// ACLs applied when leader info is first created.
    pub leader_info_acls: Vec<Acl>,

    /// Assignment distribution tunables.
    pub distribution: DistributionConfig,

    /// Port supervisors listen on when the host carries none.
    pub supervisor_port: u16,

    /// Timeout for a single assignment push to a supervisor.
    pub supervisor_request_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Assignment distribution tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionConfig {
    /// Number of shards, each with one queue and one worker.
    pub shard_count: usize,

    /// Capacity of each shard's queue.
    pub queue_capacity: usize,

    /// Single-process deployment: deliver to registered in-process supervisors.
    pub local_mode: bool,

    /// How long a push waits for queue space before it is dropped.
    pub offer_timeout: Duration,

    /// Idle wait between empty-queue checks in a worker.
    pub poll_interval: Duration,

    /// Bound on waiting for workers during close.
    pub close_timeout: Duration,

    /// Seed for shard selection; OS entropy when unset.
    pub shard_seed: Option<u64>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            shard_count: 10,
            queue_capacity: 100,
            local_mode: false,
            offer_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            close_timeout: Duration::from_secs(10),
            shard_seed: None,
        }
    }
}

impl DistributionConfig {
    /// Shortest idle wait a worker is allowed between queue checks.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Copy with counts raised to at least one and the poll interval raised
    /// to [`Self::MIN_POLL_INTERVAL`].
    pub fn normalized(&self) -> Self {
        Self {
            shard_count: self.shard_count.max(1),
            queue_capacity: self.queue_capacity.max(1),
            poll_interval: self.poll_interval.max(Self::MIN_POLL_INTERVAL),
            ..self.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zookeeper_root: DEFAULT_ZOOKEEPER_ROOT.to_string(),
            leader_host: "localhost".to_string(),
            leader_port: 6627,
            leader_info_acls: Vec::new(),
            distribution: DistributionConfig::default(),
            supervisor_port: 6628,
            supervisor_request_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let distribution_defaults = DistributionConfig::default();

        let zookeeper_root = std::env::var("TEMPEST_ZOOKEEPER_ROOT")
            .map(|root| root.trim_end_matches('/').to_string())
            .unwrap_or(defaults.zookeeper_root);

        let leader_host = std::env::var("TEMPEST_NIMBUS_HOST").unwrap_or(defaults.leader_host);
        let leader_port = env_parse("TEMPEST_NIMBUS_PORT")?.unwrap_or(defaults.leader_port);

        let leader_info_acls = match std::env::var("TEMPEST_ZOOKEEPER_ACL") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Acl::from_str)
                .collect::<Result<Vec<_>, _>>()
                .context("TEMPEST_ZOOKEEPER_ACL must be a comma separated list of scheme:id:perms")?,
            Err(_) => defaults.leader_info_acls,
        };

        let local_mode = match std::env::var("TEMPEST_CLUSTER_MODE") {
            Ok(mode) => match mode.to_lowercase().as_str() {
                "local" => true,
                "distributed" => false,
                other => anyhow::bail!(
                    "TEMPEST_CLUSTER_MODE must be 'local' or 'distributed', got '{other}'"
                ),
            },
            Err(_) => distribution_defaults.local_mode,
        };

        let shard_count: usize = env_parse("TEMPEST_ASSIGNMENTS_SERVICE_THREADS")?
            .unwrap_or(distribution_defaults.shard_count);
        let queue_capacity: usize = env_parse("TEMPEST_ASSIGNMENTS_SERVICE_THREAD_QUEUE_SIZE")?
            .unwrap_or(distribution_defaults.queue_capacity);

        let offer_timeout = env_parse("TEMPEST_ASSIGNMENTS_OFFER_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(distribution_defaults.offer_timeout);
        let poll_interval = env_parse("TEMPEST_ASSIGNMENTS_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(distribution_defaults.poll_interval);
        let close_timeout = env_parse("TEMPEST_ASSIGNMENTS_CLOSE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(distribution_defaults.close_timeout);
        let shard_seed = env_parse("TEMPEST_ASSIGNMENTS_SHARD_SEED")?;

        let supervisor_port =
            env_parse("TEMPEST_SUPERVISOR_PORT")?.unwrap_or(defaults.supervisor_port);
        let supervisor_request_timeout = env_parse("TEMPEST_SUPERVISOR_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.supervisor_request_timeout);

        let log_level = std::env::var("TEMPEST_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            zookeeper_root,
            leader_host,
            leader_port,
            leader_info_acls,
            distribution: DistributionConfig {
                shard_count: shard_count.max(1),
                queue_capacity: queue_capacity.max(1),
                local_mode,
                offer_timeout,
                poll_interval,
                close_timeout,
                shard_seed,
            },
            supervisor_port,
            supervisor_request_timeout,
            log_level,
        })
    }
}

/// Parse an optional environment variable.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .ok()
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{name} has an invalid value"))
}
