//! Assignment payload definitions.
//!
//! A [`SupervisorAssignments`] maps each job to its [`Assignment`]. Each
//! assignment records which hosts run which nodes and where every executor
//! range is placed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tempest_id::{JobId, NodeId};

// =============================================================================
// Placement
// =============================================================================

/// A contiguous range of executor task ids, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutorRange {
    pub start: u32,
    pub end: u32,
}

impl ExecutorRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of tasks covered by this range.
    pub fn task_count(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }
}

/// A worker slot: a node and one of its worker ports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodePort {
    pub node: NodeId,
    pub port: u16,
}

/// Resources reserved for a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkerResources {
    pub mem_on_heap_mb: f64,
    pub mem_off_heap_mb: f64,
    pub cpu: f64,
}

/// Placement of one executor range onto a worker slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorPlacement {
    pub executor: ExecutorRange,
    pub slot: NodePort,
    /// Unix seconds at which the executor was (re)scheduled onto the slot.
    #[serde(default)]
    pub start_time_secs: u64,
}

// =============================================================================
// Assignment
// =============================================================================

/// Scheduling assignment for a single job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assignment {
    /// Directory on the master holding the job's code.
    pub master_code_dir: String,

    /// Host of every node participating in this job.
    #[serde(default)]
    pub node_host: BTreeMap<NodeId, String>,

    /// Where each executor range runs.
    #[serde(default)]
    pub executors: Vec<ExecutorPlacement>,

    /// Resources reserved per slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worker_resources: Vec<(NodePort, WorkerResources)>,

    /// Submitting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Assignment {
    /// Executor placements that land on the given node.
    pub fn executors_on<'a>(
        &'a self,
        node: &'a NodeId,
    ) -> impl Iterator<Item = &'a ExecutorPlacement> + 'a {
        self.executors.iter().filter(move |p| &p.slot.node == node)
    }
}

// =============================================================================
// Supervisor Assignments
// =============================================================================

/// Full assignment snapshot pushed to a supervisor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupervisorAssignments {
    #[serde(default)]
    pub storm_assignment: BTreeMap<JobId, Assignment>,
}

impl SupervisorAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the assignment for a job.
    pub fn with_assignment(mut self, job: JobId, assignment: Assignment) -> Self {
        self.storm_assignment.insert(job, assignment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.storm_assignment.is_empty()
    }

    /// Resolves a node's host from the payload's own node-to-host mapping.
    ///
    /// Jobs are scanned in id order and the first mapping that lists the node
    /// wins.
    pub fn host_for(&self, node: &NodeId) -> Option<&str> {
        self.storm_assignment
            .values()
            .find_map(|a| a.node_host.get(node))
            .map(String::as_str)
    }

    /// Number of executor tasks placed on the given node across all jobs.
    pub fn task_count_on(&self, node: &NodeId) -> u64 {
        self.storm_assignment
            .values()
            .flat_map(|a| a.executors_on(node))
            .map(|p| u64::from(p.executor.task_count()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeId {
        NodeId::parse(s).unwrap()
    }

    fn job(s: &str) -> JobId {
        JobId::parse(s).unwrap()
    }

    fn assignment(nodes: &[(&str, &str)]) -> Assignment {
        Assignment {
            master_code_dir: "/var/tempest/nimbus".to_string(),
            node_host: nodes
                .iter()
                .map(|(n, h)| (node(n), h.to_string()))
                .collect(),
            executors: nodes
                .iter()
                .enumerate()
                .map(|(i, (n, _))| ExecutorPlacement {
                    executor: ExecutorRange::new(i as u32 * 2 + 1, i as u32 * 2 + 2),
                    slot: NodePort {
                        node: node(n),
                        port: 6700,
                    },
                    start_time_secs: 0,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_host_for_scans_all_jobs() {
        let payload = SupervisorAssignments::new()
            .with_assignment(job("a"), assignment(&[("sup-1", "host-1")]))
            .with_assignment(job("b"), assignment(&[("sup-2", "host-2")]));

        assert_eq!(payload.host_for(&node("sup-1")), Some("host-1"));
        assert_eq!(payload.host_for(&node("sup-2")), Some("host-2"));
        assert_eq!(payload.host_for(&node("sup-3")), None);
    }

    #[test]
    fn test_host_for_empty_payload() {
        assert_eq!(SupervisorAssignments::new().host_for(&node("sup-1")), None);
    }

    #[test]
    fn test_task_count_on() {
        let payload = SupervisorAssignments::new()
            .with_assignment(job("a"), assignment(&[("sup-1", "h1"), ("sup-2", "h2")]))
            .with_assignment(job("b"), assignment(&[("sup-1", "h1")]));

        assert_eq!(payload.task_count_on(&node("sup-1")), 4);
        assert_eq!(payload.task_count_on(&node("sup-2")), 2);
    }

    #[test]
    fn test_json_shape() {
        let payload =
            SupervisorAssignments::new().with_assignment(job("a"), assignment(&[("sup-1", "h1")]));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["storm_assignment"]["a"]["node_host"]["sup-1"], "h1");
        assert!(json["storm_assignment"]["a"].get("owner").is_none());
    }
}
