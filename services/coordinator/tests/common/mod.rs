//! Shared fixtures for coordinator integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tempest_assignments::{AssignmentReceiver, ReceiveError, SupervisorAssignments};
use tempest_coordinator::blobstore::{MemoryBlobStore, Subject};
use tempest_coordinator::cluster::{
    storms_path, CoordinationClient, CreateMode, MemoryClusterState, MemoryCoordination, StormBase,
};
use tempest_coordinator::distribution::ShardSelector;
use tempest_coordinator::leader::{LeaderTakeover, MemoryLeaderLatch};
use tempest_coordinator::Config;
use tempest_id::{JobId, NodeId, TopologyBlob};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// =============================================================================
// Takeover
// =============================================================================

#[allow(dead_code)]
pub struct TakeoverHarness {
    pub config: Config,
    pub zk: Arc<MemoryCoordination>,
    pub blobs: Arc<MemoryBlobStore>,
    pub latch: Arc<MemoryLeaderLatch>,
    pub state: Arc<MemoryClusterState>,
}

#[allow(dead_code)]
impl TakeoverHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let zk = Arc::new(MemoryCoordination::new());
        let state = Arc::new(MemoryClusterState::new(zk.clone(), &config.zookeeper_root));
        Self {
            config,
            zk,
            blobs: Arc::new(MemoryBlobStore::new()),
            latch: Arc::new(MemoryLeaderLatch::elected()),
            state,
        }
    }

    pub fn takeover(&self) -> LeaderTakeover {
        LeaderTakeover::new(
            &self.config,
            self.zk.clone(),
            self.state.clone(),
            self.blobs.clone(),
            self.latch.clone(),
            Subject::new("nimbus"),
        )
    }

    /// Mark a job active in the coordination tree.
    pub async fn activate(&self, job: &str) -> JobId {
        let id = JobId::parse(job).unwrap();
        let base = serde_json::to_vec(&StormBase {
            name: format!("{job}-name"),
            owner: Some("alice".to_string()),
        })
        .unwrap();
        self.zk
            .create_node(
                &format!("{}/{}", storms_path(&self.config.zookeeper_root), job),
                base,
                CreateMode::Persistent,
                &[],
            )
            .await
            .unwrap();
        id
    }

    /// Store all three canonical blobs, the code blob naming `dependencies`
    /// as dependency artifacts.
    pub async fn store_job_blobs(&self, job: &JobId, dependencies: &[&str]) {
        let code = serde_json::json!({
            "name": job.as_str(),
            "dependency_artifacts": dependencies,
        });
        self.blobs
            .put(TopologyBlob::Jar.key_for(job), "jar-bytes")
            .await;
        self.blobs
            .put(TopologyBlob::Code.key_for(job), serde_json::to_vec(&code).unwrap())
            .await;
        self.blobs
            .put(TopologyBlob::Conf.key_for(job), "{}")
            .await;
    }
}

// =============================================================================
// Distribution
// =============================================================================

/// Always picks the same shard.
#[allow(dead_code)]
pub struct FixedShard(pub usize);

impl ShardSelector for FixedShard {
    fn select(&self, _shard_count: usize) -> usize {
        self.0
    }
}

/// Picks shards from a script, repeating the last entry once exhausted.
#[allow(dead_code)]
pub struct ScriptedShards {
    script: Vec<usize>,
    next: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedShards {
    pub fn new(script: Vec<usize>) -> Self {
        Self {
            script,
            next: AtomicUsize::new(0),
        }
    }
}

impl ShardSelector for ScriptedShards {
    fn select(&self, _shard_count: usize) -> usize {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.script[i.min(self.script.len() - 1)]
    }
}

/// Records the `master_code_dir` of job `seq` in each received payload.
#[allow(dead_code)]
pub struct RecordingReceiver {
    id: NodeId,
    pub received: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingReceiver {
    pub fn new(id: &str) -> Self {
        Self {
            id: NodeId::parse(id).unwrap(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.received.lock().unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received.lock().unwrap().len() >= count
    }
}

#[async_trait]
impl AssignmentReceiver for RecordingReceiver {
    fn node_id(&self) -> &NodeId {
        &self.id
    }

    async fn receive_assignments(
        &self,
        assignments: SupervisorAssignments,
    ) -> Result<(), ReceiveError> {
        let marker = assignments
            .storm_assignment
            .values()
            .next()
            .map(|a| a.master_code_dir.clone())
            .unwrap_or_default();
        self.received.lock().unwrap().push(marker);
        Ok(())
    }
}

/// Never finishes receiving.
#[allow(dead_code)]
pub struct StuckReceiver {
    id: NodeId,
    pub entered: AtomicUsize,
}

#[allow(dead_code)]
impl StuckReceiver {
    pub fn new(id: &str) -> Self {
        Self {
            id: NodeId::parse(id).unwrap(),
            entered: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AssignmentReceiver for StuckReceiver {
    fn node_id(&self) -> &NodeId {
        &self.id
    }

    async fn receive_assignments(
        &self,
        _assignments: SupervisorAssignments,
    ) -> Result<(), ReceiveError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// A payload with one job whose `master_code_dir` is `marker`, mapping
/// `node` to `host` when a host is given.
#[allow(dead_code)]
pub fn payload(node: &str, host: Option<&str>, marker: &str) -> SupervisorAssignments {
    let mut assignment = tempest_assignments::Assignment {
        master_code_dir: marker.to_string(),
        ..Default::default()
    };
    if let Some(host) = host {
        assignment
            .node_host
            .insert(NodeId::parse(node).unwrap(), host.to_string());
    }
    SupervisorAssignments::new().with_assignment(JobId::parse("wc-1").unwrap(), assignment)
}

#[allow(dead_code)]
pub fn node(id: &str) -> NodeId {
    NodeId::parse(id).unwrap()
}
