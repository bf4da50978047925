//! Error types for the coordinator core.

use tempest_id::{IdError, NodeId};
use thiserror::Error;

use crate::distribution::ServiceState;

/// Coordination-tree operation errors.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The node does not exist.
    #[error("no node at {0}")]
    NoNode(String),

    /// The node already exists.
    #[error("node already exists at {0}")]
    NodeExists(String),

    /// The session to the coordination service is unavailable.
    #[error("coordination service unavailable: {0}")]
    ConnectionLoss(String),
}

/// Cluster-state synchronization errors.
#[derive(Debug, Error)]
pub enum ClusterStateError {
    /// Reading the coordination tree failed.
    #[error("failed to sync {what} from coordination tree: {source}")]
    Coordination {
        what: &'static str,
        #[source]
        source: CoordinationError,
    },

    /// A stored record could not be decoded.
    #[error("failed to decode {what} at {path}: {source}")]
    Decode {
        what: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Blob store errors.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// No blob is stored under the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The caller may not read the blob.
    #[error("{principal} is not authorized to read {key}")]
    Authorization { principal: String, key: String },

    /// Reading blob content failed.
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors raised during a leadership takeover pass.
///
/// None of these relinquish leadership; the pass unwinds and leadership stays
/// as it was.
#[derive(Debug, Error)]
pub enum TakeoverError {
    /// Leader info could not be serialized.
    #[error("failed to encode leader info: {0}")]
    EncodeLeaderInfo(#[source] serde_json::Error),

    /// Leader info could not be written to the coordination tree.
    #[error("failed to publish leader info at {path}: {source}")]
    PublishLeaderInfo {
        path: String,
        #[source]
        source: CoordinationError,
    },

    /// Cluster state could not be synchronized.
    #[error("cluster state sync failed: {0}")]
    Sync(#[from] ClusterStateError),

    /// Active jobs could not be listed.
    #[error("failed to list active jobs under {path}: {source}")]
    ListJobs {
        path: String,
        #[source]
        source: CoordinationError,
    },

    /// A child of the active-jobs subtree is not a valid job id.
    #[error("invalid active job id: {0}")]
    InvalidJobId(#[from] IdError),

    /// Local blob keys could not be listed.
    #[error("failed to list local blob keys: {0}")]
    ListKeys(#[source] BlobStoreError),

    /// A code blob could not be read.
    #[error("exception occurred while reading blob for key {key}: {source}")]
    BlobRead {
        key: String,
        #[source]
        source: BlobStoreError,
    },

    /// A code blob did not decode into a job definition.
    #[error("failed to decode job definition from {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The election latch could not be released.
    #[error("failed to release leadership: {0}")]
    Relinquish(#[source] std::io::Error),
}

/// Assignment distribution errors.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// The service is not in the state the operation requires.
    #[error("distribution service is {actual}, expected {expected}")]
    InvalidState {
        expected: ServiceState,
        actual: ServiceState,
    },

    /// Local mode push for a node with no registered supervisor.
    #[error("no local supervisor registered for node {0}")]
    UnknownLocalSupervisor(NodeId),
}
