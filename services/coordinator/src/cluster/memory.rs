//! In-memory coordination tree and cluster state.
//!
//! Backs local mode and tests. The tree creates missing parents on create,
//! like the coordination service's recipes do, and can be switched into an
//! unavailable state to exercise failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempest_assignments::Assignment;
use tempest_id::JobId;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{assignments_path, storms_path, Acl, ClusterState, CoordinationClient, CreateMode};
use crate::error::{ClusterStateError, CoordinationError};

#[derive(Debug, Clone)]
struct ZNode {
    data: Vec<u8>,
    mode: CreateMode,
    acls: Vec<Acl>,
}

/// In-memory coordination tree.
#[derive(Default)]
pub struct MemoryCoordination {
    nodes: RwLock<BTreeMap<String, ZNode>>,
    unavailable: AtomicBool,
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection loss (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create `path` and its parents if missing, leaving existing data alone.
    pub async fn ensure_path(&self, path: &str) {
        let mut nodes = self.nodes.write().await;
        for prefix in ancestors_and_self(path) {
            nodes.entry(prefix).or_insert_with(|| ZNode {
                data: Vec::new(),
                mode: CreateMode::Persistent,
                acls: Vec::new(),
            });
        }
    }

    /// Mode and ACLs of the node at `path`, if present.
    pub async fn node_meta(&self, path: &str) -> Option<(CreateMode, Vec<Acl>)> {
        let nodes = self.nodes.read().await;
        nodes.get(path).map(|n| (n.mode, n.acls.clone()))
    }

    fn check_available(&self) -> Result<(), CoordinationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoordinationError::ConnectionLoss(
                "in-memory tree marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Every proper ancestor of `path` followed by `path` itself.
fn ancestors_and_self(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

#[async_trait]
impl CoordinationClient for MemoryCoordination {
    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        self.check_available()?;
        let nodes = self.nodes.read().await;
        if !nodes.contains_key(path) {
            return Err(CoordinationError::NoNode(path.to_string()));
        }

        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| {
                let child = &k[prefix.len()..];
                (!child.contains('/')).then(|| child.to_string())
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        self.check_available()?;
        Ok(self.nodes.read().await.contains_key(path))
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        self.check_available()?;
        self.nodes
            .read()
            .await
            .get(path)
            .map(|n| n.data.clone())
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))
    }

    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))?;
        node.data = data;
        Ok(())
    }

    async fn create_node(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
        acls: &[Acl],
    ) -> Result<(), CoordinationError> {
        self.check_available()?;
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(path) {
            return Err(CoordinationError::NodeExists(path.to_string()));
        }

        let mut chain = ancestors_and_self(path);
        chain.pop();
        for parent in chain {
            nodes.entry(parent).or_insert_with(|| ZNode {
                data: Vec::new(),
                mode: CreateMode::Persistent,
                acls: acls.to_vec(),
            });
        }

        nodes.insert(
            path.to_string(),
            ZNode {
                data,
                mode,
                acls: acls.to_vec(),
            },
        );
        debug!(path = %path, ?mode, "Created coordination node");
        Ok(())
    }
}

// =============================================================================
// Cluster State
// =============================================================================

/// Per-job record stored under the active-jobs subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormBase {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Cluster state backed by a coordination client, with local caches.
pub struct MemoryClusterState {
    coordination: Arc<dyn CoordinationClient>,
    root: String,
    assignments: RwLock<BTreeMap<JobId, Assignment>>,
    ids: RwLock<BTreeMap<String, JobId>>,
    synchronized: AtomicBool,
}

impl MemoryClusterState {
    pub fn new(coordination: Arc<dyn CoordinationClient>, root: impl Into<String>) -> Self {
        Self {
            coordination,
            root: root.into(),
            assignments: RwLock::new(BTreeMap::new()),
            ids: RwLock::new(BTreeMap::new()),
            synchronized: AtomicBool::new(false),
        }
    }

    /// Cached assignment for a job.
    pub async fn assignment(&self, job: &JobId) -> Option<Assignment> {
        self.assignments.read().await.get(job).cloned()
    }

    /// Cached job id for a job name.
    pub async fn job_id_for(&self, name: &str) -> Option<JobId> {
        self.ids.read().await.get(name).cloned()
    }

    /// Children of `path`, treating a missing subtree as empty.
    async fn children_or_empty(
        &self,
        path: &str,
        what: &'static str,
    ) -> Result<Vec<String>, ClusterStateError> {
        match self.coordination.get_children(path).await {
            Ok(children) => Ok(children),
            Err(CoordinationError::NoNode(_)) => {
                warn!(path = %path, "Subtree missing, treating as empty");
                Ok(Vec::new())
            }
            Err(source) => Err(ClusterStateError::Coordination { what, source }),
        }
    }
}

#[async_trait]
impl ClusterState for MemoryClusterState {
    async fn sync_remote_assignments(&self) -> Result<(), ClusterStateError> {
        const WHAT: &str = "assignments";
        let base = assignments_path(&self.root);
        let mut synced = BTreeMap::new();

        for child in self.children_or_empty(&base, WHAT).await? {
            let path = format!("{base}/{child}");
            let Ok(job) = JobId::parse(&child) else {
                warn!(path = %path, "Skipping assignment with invalid job id");
                continue;
            };
            let data = self
                .coordination
                .get_data(&path)
                .await
                .map_err(|source| ClusterStateError::Coordination { what: WHAT, source })?;
            let assignment = serde_json::from_slice(&data).map_err(|source| {
                ClusterStateError::Decode {
                    what: WHAT,
                    path: path.clone(),
                    source,
                }
            })?;
            synced.insert(job, assignment);
        }

        info!(count = synced.len(), "Synced remote assignments");
        *self.assignments.write().await = synced;
        Ok(())
    }

    async fn sync_remote_ids(&self) -> Result<(), ClusterStateError> {
        const WHAT: &str = "job ids";
        let base = storms_path(&self.root);
        let mut synced = BTreeMap::new();

        for child in self.children_or_empty(&base, WHAT).await? {
            let path = format!("{base}/{child}");
            let Ok(job) = JobId::parse(&child) else {
                warn!(path = %path, "Skipping job with invalid id");
                continue;
            };
            let data = self
                .coordination
                .get_data(&path)
                .await
                .map_err(|source| ClusterStateError::Coordination { what: WHAT, source })?;
            if data.is_empty() {
                continue;
            }
            let storm_base: StormBase =
                serde_json::from_slice(&data).map_err(|source| ClusterStateError::Decode {
                    what: WHAT,
                    path: path.clone(),
                    source,
                })?;
            synced.insert(storm_base.name, job);
        }

        info!(count = synced.len(), "Synced remote job ids");
        *self.ids.write().await = synced;
        Ok(())
    }

    fn set_assignments_backend_synchronized(&self) {
        self.synchronized.store(true, Ordering::SeqCst);
    }

    fn is_assignments_backend_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::SeqCst)
    }
}
