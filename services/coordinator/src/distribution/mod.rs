//! Sharded assignment distribution.
//!
//! Pushes are spread across N shards, each a bounded queue drained by one
//! worker task. A slow or failing delivery only holds up its own shard.
//! Pushes are best-effort: a full queue drops the push, and supervisors
//! reconcile against cluster state for anything they miss.

mod delivery;
mod service;
mod shard;
mod transport;

pub use delivery::LocalSupervisors;
pub use service::{AssignmentDistributionService, PushOutcome, ServiceState};
pub use shard::{RandomShardSelector, ShardSelector};
pub use transport::{best_effort_send, AssignmentTransport};
