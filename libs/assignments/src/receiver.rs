//! Receiver trait implemented by supervisors.

use async_trait::async_trait;
use tempest_id::NodeId;

use crate::{ReceiveError, SupervisorAssignments};

/// A delivery target for supervisor assignments.
#[async_trait]
pub trait AssignmentReceiver: Send + Sync {
    /// Identifier of the node this receiver serves.
    fn node_id(&self) -> &NodeId;

    /// Accept a full assignment snapshot for this node.
    async fn receive_assignments(
        &self,
        assignments: SupervisorAssignments,
    ) -> Result<(), ReceiveError>;
}
