//! Coordination tree and cluster state collaborators.
//!
//! The coordinator only needs a narrow slice of the coordination service:
//! child listing under the active-jobs subtree, and read/write/create at the
//! leader-info path. [`ClusterState`] is the higher-level facade that owns
//! the local caches of assignments and job ids.

mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ClusterStateError, CoordinationError};

pub use memory::{MemoryClusterState, MemoryCoordination, StormBase};

/// Subtree listing active jobs, relative to the cluster root.
pub const STORMS_SUBTREE: &str = "/storms";

/// Subtree holding per-job assignments, relative to the cluster root.
pub const ASSIGNMENTS_SUBTREE: &str = "/assignments";

/// Node holding the current leader's info, relative to the cluster root.
pub const LEADERINFO_SUBTREE: &str = "/leaderinfo";

/// Path of the active-jobs subtree under `root`.
pub fn storms_path(root: &str) -> String {
    format!("{root}{STORMS_SUBTREE}")
}

/// Path of the assignments subtree under `root`.
pub fn assignments_path(root: &str) -> String {
    format!("{root}{ASSIGNMENTS_SUBTREE}")
}

/// Path of the leader-info node under `root`.
pub fn leader_info_path(root: &str) -> String {
    format!("{root}{LEADERINFO_SUBTREE}")
}

/// Lifetime of a created node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Survives the creating session.
    Persistent,
    /// Removed when the creating session ends.
    Ephemeral,
}

// =============================================================================
// ACLs
// =============================================================================

/// Permission bits, matching the coordination service's encoding.
pub mod perms {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 1 << 1;
    pub const CREATE: u32 = 1 << 2;
    pub const DELETE: u32 = 1 << 3;
    pub const ADMIN: u32 = 1 << 4;
    pub const ALL: u32 = READ | WRITE | CREATE | DELETE | ADMIN;
}

/// An access-control entry applied to a created node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub scheme: String,
    pub id: String,
    pub perms: u32,
}

impl Acl {
    pub fn new(scheme: impl Into<String>, id: impl Into<String>, perms: u32) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            perms,
        }
    }

    /// Open access for everyone.
    pub fn world_all() -> Self {
        Self::new("world", "anyone", perms::ALL)
    }
}

/// Error parsing an ACL entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AclParseError {
    #[error("ACL '{0}' must look like scheme:id:perms")]
    Format(String),

    #[error("ACL '{entry}' has unknown permission '{perm}' (expected any of cdrwa)")]
    Permission { entry: String, perm: char },
}

impl FromStr for Acl {
    type Err = AclParseError;

    /// Parses `scheme:id:perms` where perms is a subset of `cdrwa`.
    ///
    /// The id may itself contain `:` (digest ids do), so the scheme is split
    /// from the front and perms from the back.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| AclParseError::Format(s.to_string()))?;
        let (id, perm_chars) = rest
            .rsplit_once(':')
            .ok_or_else(|| AclParseError::Format(s.to_string()))?;
        if scheme.is_empty() || id.is_empty() {
            return Err(AclParseError::Format(s.to_string()));
        }

        let mut bits = 0;
        for perm in perm_chars.chars() {
            bits |= match perm {
                'c' => perms::CREATE,
                'd' => perms::DELETE,
                'r' => perms::READ,
                'w' => perms::WRITE,
                'a' => perms::ADMIN,
                other => {
                    return Err(AclParseError::Permission {
                        entry: s.to_string(),
                        perm: other,
                    })
                }
            };
        }

        Ok(Self::new(scheme, id, bits))
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters: String = [
            (perms::CREATE, 'c'),
            (perms::DELETE, 'd'),
            (perms::READ, 'r'),
            (perms::WRITE, 'w'),
            (perms::ADMIN, 'a'),
        ]
        .iter()
        .filter(|(bit, _)| self.perms & bit != 0)
        .map(|(_, c)| *c)
        .collect();
        write!(f, "{}:{}:{}", self.scheme, self.id, letters)
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Key/value tree with child listing; reads are watch-free.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Names of the direct children of `path`.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;

    /// Whether a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, CoordinationError>;

    /// Data stored at `path`.
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError>;

    /// Overwrite the data of an existing node.
    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError>;

    /// Create a node, creating missing parents.
    async fn create_node(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
        acls: &[Acl],
    ) -> Result<(), CoordinationError>;
}

/// Facade over the coordination tree holding the master's local caches.
#[async_trait]
pub trait ClusterState: Send + Sync {
    /// Pull every job's assignment into the local cache.
    async fn sync_remote_assignments(&self) -> Result<(), ClusterStateError>;

    /// Pull the job name to id mapping into the local cache.
    async fn sync_remote_ids(&self) -> Result<(), ClusterStateError>;

    /// Mark the local assignment backend as caught up with the tree.
    fn set_assignments_backend_synchronized(&self);

    /// Whether the local assignment backend has been marked synchronized.
    fn is_assignments_backend_synchronized(&self) -> bool;
}
