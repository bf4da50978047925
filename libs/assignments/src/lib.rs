//! # tempest-assignments
//!
//! Assignment payloads pushed from the coordinator to supervisors.
//!
//! ## Design Principles
//!
//! - A payload is self-describing: it carries the node-to-host mapping the
//!   coordinator uses to address the push
//! - Payloads are immutable once built; a push is consumed exactly once
//! - Pushes are best-effort; supervisors reconcile against cluster state
//!   when one is dropped
//!
//! ## Delivery
//!
//! [`AssignmentReceiver`] is the seam between the coordinator and a
//! supervisor. In local mode the coordinator calls it in-process; in
//! distributed mode the supervisor's HTTP endpoint calls it on receipt.

mod error;
mod node;
mod receiver;
mod types;

pub use error::ReceiveError;
pub use node::NodeAssignments;
pub use receiver::AssignmentReceiver;
pub use types::*;

/// HTTP path a supervisor serves assignment pushes on.
pub const RECEIVE_ASSIGNMENTS_PATH: &str = "/v1/assignments";
