//! Per-item delivery, in-process or over the network.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tempest_assignments::{AssignmentReceiver, NodeAssignments};
use tempest_id::NodeId;
use tracing::{debug, error, warn};

use super::transport::{best_effort_send, AssignmentTransport};
use crate::error::DistributionError;

/// In-process supervisors keyed by node id, for local mode.
#[derive(Default)]
pub struct LocalSupervisors {
    receivers: RwLock<HashMap<NodeId, Arc<dyn AssignmentReceiver>>>,
}

impl LocalSupervisors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a receiver under its own node id, replacing any previous one.
    pub fn register(&self, receiver: Arc<dyn AssignmentReceiver>) {
        let node = receiver.node_id().clone();
        let replaced = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.clone(), receiver)
            .is_some();
        debug!(node = %node, replaced, "Registered local supervisor");
    }

    pub fn get(&self, node: &NodeId) -> Option<Arc<dyn AssignmentReceiver>> {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a shard worker hands its items.
#[derive(Clone)]
pub(crate) enum Delivery {
    Local(Arc<LocalSupervisors>),
    Remote(Arc<dyn AssignmentTransport>),
}

impl Delivery {
    /// Deliver one push.
    ///
    /// Only a local-mode push for an unregistered node is an error; every
    /// other failure is logged and swallowed.
    pub(crate) async fn deliver(
        &self,
        shard: usize,
        push: NodeAssignments,
    ) -> Result<(), DistributionError> {
        match self {
            Delivery::Local(supervisors) => {
                let Some(receiver) = supervisors.get(push.node()) else {
                    error!(shard, node = %push.node(), "Can not find node for assignments distribution");
                    return Err(DistributionError::UnknownLocalSupervisor(push.node().clone()));
                };
                if let Err(e) = receiver.receive_assignments(push.to_payload()).await {
                    warn!(shard, node = %push.node(), error = %e, "Local supervisor refused assignments");
                }
                Ok(())
            }
            Delivery::Remote(transport) => {
                best_effort_send(transport.as_ref(), &push).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempest_assignments::{ReceiveError, SupervisorAssignments};

    struct CountingReceiver {
        id: NodeId,
        received: AtomicUsize,
    }

    #[async_trait]
    impl AssignmentReceiver for CountingReceiver {
        fn node_id(&self) -> &NodeId {
            &self.id
        }

        async fn receive_assignments(
            &self,
            _assignments: SupervisorAssignments,
        ) -> Result<(), ReceiveError> {
            self.received.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_local_delivery() {
        let supervisors = Arc::new(LocalSupervisors::new());
        let receiver = Arc::new(CountingReceiver {
            id: NodeId::parse("sup-1").unwrap(),
            received: AtomicUsize::new(0),
        });
        supervisors.register(receiver.clone());
        assert_eq!(supervisors.len(), 1);

        let delivery = Delivery::Local(supervisors);
        let push = NodeAssignments::new(receiver.id.clone(), SupervisorAssignments::new());
        delivery.deliver(0, push).await.unwrap();
        assert_eq!(receiver.received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_delivery_unknown_node() {
        let delivery = Delivery::Local(Arc::new(LocalSupervisors::new()));
        let push = NodeAssignments::new(NodeId::parse("ghost").unwrap(), SupervisorAssignments::new());
        let err = delivery.deliver(3, push).await.unwrap_err();
        assert!(matches!(err, DistributionError::UnknownLocalSupervisor(n) if n.as_str() == "ghost"));
    }
}
