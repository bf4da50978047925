//! In-process supervisor state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tempest_assignments::{AssignmentReceiver, ReceiveError, SupervisorAssignments};
use tempest_id::NodeId;
use tokio::sync::watch;
use tracing::{info, warn};

/// Holds the most recent assignment snapshot pushed to this node.
pub struct Supervisor {
    id: NodeId,
    latest: ArcSwapOption<SupervisorAssignments>,
    receipts: watch::Sender<u64>,
    stopped: AtomicBool,
}

impl Supervisor {
    pub fn new(id: NodeId) -> Self {
        let (receipts, _) = watch::channel(0);
        Self {
            id,
            latest: ArcSwapOption::empty(),
            receipts,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Latest snapshot received, if any.
    pub fn latest_assignments(&self) -> Option<Arc<SupervisorAssignments>> {
        self.latest.load_full()
    }

    /// Executor tasks the latest snapshot places on this node.
    pub fn assigned_tasks(&self) -> u64 {
        self.latest_assignments()
            .map_or(0, |assignments| assignments.task_count_on(&self.id))
    }

    /// Number of snapshots accepted so far.
    pub fn receipt_count(&self) -> u64 {
        *self.receipts.borrow()
    }

    /// Wait until at least `count` snapshots have been accepted.
    ///
    /// Returns false if that does not happen within `within`.
    pub async fn wait_for_receipts(&self, count: u64, within: Duration) -> bool {
        let mut rx = self.receipts.subscribe();
        let reached = matches!(
            tokio::time::timeout(within, rx.wait_for(|received| *received >= count)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Refuse further pushes.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!(node = %self.id, "Supervisor stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssignmentReceiver for Supervisor {
    fn node_id(&self) -> &NodeId {
        &self.id
    }

    async fn receive_assignments(
        &self,
        assignments: SupervisorAssignments,
    ) -> Result<(), ReceiveError> {
        if self.is_stopped() {
            warn!(node = %self.id, "Dropping assignments pushed to a stopped supervisor");
            return Err(ReceiveError::Stopped(self.id.to_string()));
        }

        let jobs = assignments.storm_assignment.len();
        let tasks = assignments.task_count_on(&self.id);
        self.latest.store(Some(Arc::new(assignments)));
        self.receipts.send_modify(|received| *received += 1);

        info!(node = %self.id, jobs, tasks, "Received supervisor assignments");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempest_assignments::{Assignment, ExecutorPlacement, ExecutorRange, NodePort};
    use tempest_id::JobId;

    fn snapshot(node: &NodeId) -> SupervisorAssignments {
        let mut assignment = Assignment::default();
        assignment
            .node_host
            .insert(node.clone(), "worker-1".to_string());
        assignment.executors.push(ExecutorPlacement {
            executor: ExecutorRange::new(1, 4),
            slot: NodePort {
                node: node.clone(),
                port: 6700,
            },
            start_time_secs: 0,
        });
        SupervisorAssignments::new().with_assignment(JobId::parse("wc-1").unwrap(), assignment)
    }

    #[tokio::test]
    async fn test_receive_stores_latest() {
        let id = NodeId::parse("sup-1").unwrap();
        let supervisor = Supervisor::new(id.clone());
        assert!(supervisor.latest_assignments().is_none());
        assert_eq!(supervisor.assigned_tasks(), 0);

        supervisor.receive_assignments(snapshot(&id)).await.unwrap();

        assert_eq!(supervisor.receipt_count(), 1);
        assert_eq!(supervisor.assigned_tasks(), 4);
        assert!(supervisor.wait_for_receipts(1, Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_stopped_supervisor_refuses() {
        let id = NodeId::parse("sup-1").unwrap();
        let supervisor = Supervisor::new(id.clone());
        supervisor.stop();

        let err = supervisor.receive_assignments(snapshot(&id)).await.unwrap_err();
        assert!(matches!(err, ReceiveError::Stopped(_)));
        assert_eq!(supervisor.receipt_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_without_local_work_is_accepted() {
        let id = NodeId::parse("sup-1").unwrap();
        let supervisor = Supervisor::new(id);
        let other = NodeId::parse("sup-2").unwrap();

        supervisor.receive_assignments(snapshot(&other)).await.unwrap();
        supervisor
            .receive_assignments(SupervisorAssignments::new())
            .await
            .unwrap();

        assert_eq!(supervisor.receipt_count(), 2);
        assert_eq!(supervisor.assigned_tasks(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_receipts_wakes_on_later_push() {
        let id = NodeId::parse("sup-1").unwrap();
        let supervisor = Arc::new(Supervisor::new(id.clone()));

        let waiter = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.wait_for_receipts(2, Duration::from_secs(5)).await })
        };
        supervisor.receive_assignments(snapshot(&id)).await.unwrap();
        supervisor.receive_assignments(snapshot(&id)).await.unwrap();

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_receipts_times_out() {
        let supervisor = Supervisor::new(NodeId::parse("sup-1").unwrap());
        assert!(!supervisor.wait_for_receipts(1, Duration::from_secs(1)).await);
    }
}
