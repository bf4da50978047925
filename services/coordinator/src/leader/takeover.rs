//! Accept-or-relinquish decision run once per election win.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tempest_id::{canonical_keys, JobId, TopologyBlob};
use tracing::{debug, error, info, instrument, warn};

use super::{JobDefinition, LeaderInfo, LeaderLatch};
use crate::blobstore::{BlobStore, Subject};
use crate::cluster::{leader_info_path, storms_path, Acl, ClusterState, CoordinationClient, CreateMode};
use crate::config::Config;
use crate::error::{CoordinationError, TakeoverError};

/// Outcome of a takeover pass that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoverDecision {
    /// Every active job's blobs and dependencies are present; leadership kept.
    Accepted,
    /// Something is missing locally; the election latch has been closed.
    Relinquished(RelinquishReason),
}

impl TakeoverDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TakeoverDecision::Accepted)
    }
}

/// Why leadership was given up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelinquishReason {
    /// Canonical blob keys of active jobs absent from the local store.
    MissingTopologyBlobs(BTreeSet<String>),
    /// Dependency names referenced by active jobs absent from the local store.
    MissingDependencies(BTreeSet<String>),
}

/// Leadership takeover validator.
pub struct LeaderTakeover {
    coordination: Arc<dyn CoordinationClient>,
    cluster_state: Arc<dyn ClusterState>,
    blob_store: Arc<dyn BlobStore>,
    latch: Arc<dyn LeaderLatch>,
    subject: Subject,
    leader_info: LeaderInfo,
    root: String,
    acls: Vec<Acl>,
}

impl LeaderTakeover {
    pub fn new(
        config: &Config,
        coordination: Arc<dyn CoordinationClient>,
        cluster_state: Arc<dyn ClusterState>,
        blob_store: Arc<dyn BlobStore>,
        latch: Arc<dyn LeaderLatch>,
        subject: Subject,
    ) -> Self {
        Self {
            coordination,
            cluster_state,
            blob_store,
            latch,
            subject,
            leader_info: LeaderInfo::from_config(config),
            root: config.zookeeper_root.clone(),
            acls: config.leader_info_acls.clone(),
        }
    }

    /// Validate local data after winning an election.
    ///
    /// Returns the decision once the pass completes; on relinquish the latch
    /// has already been closed. Errors leave leadership untouched, except for
    /// [`TakeoverError::Relinquish`] which means closing the latch failed.
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn on_elected(&self) -> Result<TakeoverDecision, TakeoverError> {
        self.publish_leader_info().await?;
        self.sync_cluster_state().await?;

        let active_jobs = self.active_jobs().await?;
        let active_blob_keys: BTreeSet<String> =
            active_jobs.iter().flat_map(canonical_keys).collect();
        let active_code_keys: BTreeSet<String> = active_jobs
            .iter()
            .map(|job| TopologyBlob::Code.key_for(job))
            .collect();

        let local_keys: BTreeSet<String> = self
            .blob_store
            .list_keys()
            .await
            .map_err(TakeoverError::ListKeys)?
            .into_iter()
            .collect();
        let local_topology_keys: BTreeSet<&str> = local_keys
            .iter()
            .map(String::as_str)
            .filter(|key| TopologyBlob::is_topology_key(key))
            .collect();

        let missing_topology_blobs: BTreeSet<String> = active_blob_keys
            .iter()
            .filter(|key| !local_topology_keys.contains(key.as_str()))
            .cloned()
            .collect();

        if !missing_topology_blobs.is_empty() {
            warn!(
                active_jobs = %join(active_jobs.iter().map(JobId::as_str)),
                local_topology_keys = %join(local_topology_keys.iter().copied()),
                missing_keys = %join(missing_topology_blobs.iter().map(String::as_str)),
                "Code for all active jobs not available locally, giving up leadership"
            );
            return self
                .relinquish(RelinquishReason::MissingTopologyBlobs(missing_topology_blobs))
                .await;
        }

        let active_dependencies = self.active_dependencies(&active_code_keys).await?;
        let missing_dependencies: BTreeSet<String> = active_dependencies
            .difference(&local_keys)
            .cloned()
            .collect();

        if !missing_dependencies.is_empty() {
            warn!(
                active_dependencies = %join(active_dependencies.iter().map(String::as_str)),
                local_keys = %join(local_keys.iter().map(String::as_str)),
                missing_dependencies = %join(missing_dependencies.iter().map(String::as_str)),
                "Dependencies for active jobs not available locally, giving up leadership"
            );
            return self
                .relinquish(RelinquishReason::MissingDependencies(missing_dependencies))
                .await;
        }

        info!(
            active_jobs = active_jobs.len(),
            dependencies = active_dependencies.len(),
            "Accepting leadership, all active jobs and dependencies are available locally"
        );
        Ok(TakeoverDecision::Accepted)
    }

    /// Write leader info, updating the node in place when it already exists.
    async fn publish_leader_info(&self) -> Result<(), TakeoverError> {
        let path = leader_info_path(&self.root);
        let info = LeaderInfo {
            elected_at: Utc::now(),
            ..self.leader_info.clone()
        };
        let data = info.to_bytes().map_err(TakeoverError::EncodeLeaderInfo)?;
        let publish_err = |source: CoordinationError| TakeoverError::PublishLeaderInfo {
            path: path.clone(),
            source,
        };

        if self.coordination.exists(&path).await.map_err(publish_err)? {
            self.coordination
                .set_data(&path, data)
                .await
                .map_err(publish_err)?;
        } else {
            self.coordination
                .create_node(&path, data, CreateMode::Persistent, &self.acls)
                .await
                .map_err(publish_err)?;
        }

        debug!(path = %path, host = %info.host, port = info.port, "Published leader info");
        Ok(())
    }

    async fn sync_cluster_state(&self) -> Result<(), TakeoverError> {
        info!("Syncing remote assignments and job ids before validation");
        self.cluster_state.sync_remote_assignments().await?;
        self.cluster_state.sync_remote_ids().await?;
        self.cluster_state.set_assignments_backend_synchronized();
        Ok(())
    }

    /// Active job ids, in lexicographic order.
    async fn active_jobs(&self) -> Result<BTreeSet<JobId>, TakeoverError> {
        let path = storms_path(&self.root);
        let children = match self.coordination.get_children(&path).await {
            Ok(children) => children,
            Err(CoordinationError::NoNode(_)) => {
                debug!(path = %path, "No active jobs subtree yet");
                Vec::new()
            }
            Err(source) => return Err(TakeoverError::ListJobs { path, source }),
        };

        children
            .into_iter()
            .map(|child| JobId::parse(&child).map_err(TakeoverError::from))
            .collect()
    }

    /// Union of every dependency named by the given code blobs.
    async fn active_dependencies(
        &self,
        code_keys: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, TakeoverError> {
        let mut dependencies = BTreeSet::new();

        for key in code_keys {
            let stream = self
                .blob_store
                .get_blob(key, &self.subject)
                .await
                .map_err(|source| {
                    error!(key = %key, error = %source, "Failed to open code blob");
                    TakeoverError::BlobRead {
                        key: key.clone(),
                        source,
                    }
                })?;
            let content = stream.read_fully().await.map_err(|e| TakeoverError::BlobRead {
                key: key.clone(),
                source: e.into(),
            })?;
            let definition =
                JobDefinition::decode(&content).map_err(|source| TakeoverError::Decode {
                    key: key.clone(),
                    source,
                })?;

            dependencies.extend(definition.dependencies().map(str::to_string));
        }

        Ok(dependencies)
    }

    async fn relinquish(&self, reason: RelinquishReason) -> Result<TakeoverDecision, TakeoverError> {
        self.latch.close().await.map_err(|e| {
            error!(error = %e, "Failed to close leader latch");
            TakeoverError::Relinquish(e)
        })?;
        info!("Leader latch closed");
        Ok(TakeoverDecision::Relinquished(reason))
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobStore;
    use crate::cluster::{MemoryClusterState, MemoryCoordination};
    use crate::leader::MemoryLeaderLatch;

    struct Fixture {
        zk: Arc<MemoryCoordination>,
        blobs: Arc<MemoryBlobStore>,
        latch: Arc<MemoryLeaderLatch>,
        takeover: LeaderTakeover,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let zk = Arc::new(MemoryCoordination::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let latch = Arc::new(MemoryLeaderLatch::elected());
        let state = Arc::new(MemoryClusterState::new(zk.clone(), &config.zookeeper_root));
        let takeover = LeaderTakeover::new(
            &config,
            zk.clone(),
            state,
            blobs.clone(),
            latch.clone(),
            Subject::new("nimbus"),
        );
        Fixture {
            zk,
            blobs,
            latch,
            takeover,
        }
    }

    #[tokio::test]
    async fn test_no_active_jobs_accepts() {
        let f = fixture();
        let decision = f.takeover.on_elected().await.unwrap();
        assert_eq!(decision, TakeoverDecision::Accepted);
        assert!(f.latch.has_leadership());
        assert!(f.zk.exists("/storm/leaderinfo").await.unwrap());
    }

    #[tokio::test]
    async fn test_leader_info_updated_in_place() {
        let f = fixture();
        f.zk.create_node("/storm/leaderinfo", b"{}".to_vec(), CreateMode::Persistent, &[])
            .await
            .unwrap();

        f.takeover.on_elected().await.unwrap();

        let data = f.zk.get_data("/storm/leaderinfo").await.unwrap();
        let info = LeaderInfo::from_bytes(&data).unwrap();
        assert_eq!(info.host, "localhost");
        assert!(info.is_leader);
    }

    #[test]
    fn test_join() {
        assert_eq!(join(["a", "b"].into_iter()), "a,b");
        assert_eq!(join(std::iter::empty()), "");
    }
}
