//! tempest coordinator core.
//!
//! Two mechanisms run on the master replica:
//!
//! - [`leader::LeaderTakeover`] decides, once per election win, whether this
//!   replica holds every blob the running jobs need, and gives leadership up
//!   through the election latch if it does not.
//! - [`distribution::AssignmentDistributionService`] pushes per-node
//!   assignments to supervisors through a fixed set of bounded shards so that
//!   one slow or unreachable supervisor never stalls the others.
//!
//! The coordination tree, cluster state, blob store and election latch are
//! consumed through the traits in [`cluster`], [`blobstore`] and [`leader`];
//! in-memory implementations back local mode and tests.

pub mod blobstore;
pub mod cluster;
pub mod config;
pub mod distribution;
pub mod error;
pub mod leader;
pub mod supervisor_client;

pub use config::{Config, DistributionConfig};
pub use distribution::{AssignmentDistributionService, PushOutcome, ServiceState};
pub use leader::{LeaderTakeover, TakeoverDecision};
