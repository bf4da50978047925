//! Leadership takeover validation.
//!
//! When this replica wins an election it publishes its leader info, syncs
//! cluster state, and then checks that every active job's canonical blobs and
//! dependency blobs are present locally. If anything is missing it closes its
//! election latch so another replica can take over.

mod info;
mod latch;
mod takeover;
mod topology;

pub use info::LeaderInfo;
pub use latch::{LeaderLatch, MemoryLeaderLatch};
pub use takeover::{LeaderTakeover, RelinquishReason, TakeoverDecision};
pub use topology::JobDefinition;
