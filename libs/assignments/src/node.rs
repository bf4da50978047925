//! A single push addressed to one node.

use std::sync::Arc;

use tempest_id::NodeId;

use crate::SupervisorAssignments;

/// An assignment push for one node.
///
/// Built once per push and consumed by exactly one delivery. The payload is
/// shared so a caller pushing the same snapshot to several nodes does not
/// clone it per node.
#[derive(Debug, Clone)]
pub struct NodeAssignments {
    node: NodeId,
    assignments: Arc<SupervisorAssignments>,
}

impl NodeAssignments {
    pub fn new(node: NodeId, assignments: impl Into<Arc<SupervisorAssignments>>) -> Self {
        Self {
            node,
            assignments: assignments.into(),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn assignments(&self) -> &SupervisorAssignments {
        &self.assignments
    }

    /// Host the node is reachable at, read from the payload itself.
    pub fn host(&self) -> Option<&str> {
        self.assignments.host_for(&self.node)
    }

    /// Owned copy of the payload for a receiver that takes it by value.
    pub fn to_payload(&self) -> SupervisorAssignments {
        SupervisorAssignments::clone(&self.assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Assignment;
    use tempest_id::JobId;

    #[test]
    fn test_host_resolves_from_payload() {
        let node = NodeId::parse("sup-1").unwrap();
        let mut assignment = Assignment::default();
        assignment
            .node_host
            .insert(node.clone(), "worker-1.local".to_string());
        let payload =
            SupervisorAssignments::new().with_assignment(JobId::parse("wc-1").unwrap(), assignment);

        let push = NodeAssignments::new(node.clone(), payload.clone());
        assert_eq!(push.node(), &node);
        assert_eq!(push.host(), Some("worker-1.local"));
        assert_eq!(push.to_payload(), payload);

        let other = NodeAssignments::new(NodeId::parse("sup-2").unwrap(), payload);
        assert_eq!(other.host(), None);
    }
}
