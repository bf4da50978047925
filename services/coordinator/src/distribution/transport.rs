//! Network delivery seam for distributed mode.

use async_trait::async_trait;
use tempest_assignments::{NodeAssignments, SupervisorAssignments};
use tempest_id::NodeId;
use tracing::{debug, error};

/// Sends one assignment snapshot to a supervisor host.
#[async_trait]
pub trait AssignmentTransport: Send + Sync {
    async fn send(
        &self,
        host: &str,
        node: &NodeId,
        assignments: &SupervisorAssignments,
    ) -> anyhow::Result<()>;
}

/// Deliver a push, logging and discarding any failure.
///
/// Returns whether the supervisor acknowledged the push. The result is only
/// meant for logging; callers never retry.
pub async fn best_effort_send(transport: &dyn AssignmentTransport, push: &NodeAssignments) -> bool {
    let node = push.node();
    let Some(host) = push.host() else {
        error!(node = %node, "No host for node in assignment payload, dropping push");
        return false;
    };

    match transport.send(host, node, push.assignments()).await {
        Ok(()) => {
            debug!(node = %node, host = %host, "Sent assignments to node");
            true
        }
        Err(e) => {
            error!(
                node = %node,
                host = %host,
                error = %format!("{e:#}"),
                "Failed to send assignments to node"
            );
            false
        }
    }
}
