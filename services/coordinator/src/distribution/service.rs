//! The distribution service object and its lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tempest_assignments::{AssignmentReceiver, NodeAssignments, SupervisorAssignments};
use tempest_id::NodeId;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::delivery::{Delivery, LocalSupervisors};
use super::shard::{RandomShardSelector, ShardSelector, ShardWorker};
use super::transport::AssignmentTransport;
use crate::config::DistributionConfig;
use crate::error::DistributionError;

/// Lifecycle of the distribution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, not yet prepared.
    Stopped,
    /// Shards and workers running.
    Active,
    /// Shut down; terminal.
    Closed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Active => "active",
            ServiceState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What happened to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued on the given shard.
    Enqueued { shard: usize },
    /// The shard stayed full past the offer timeout, or its worker is gone.
    Dropped { shard: usize },
    /// The service is not active.
    Rejected,
}

impl PushOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, PushOutcome::Enqueued { .. })
    }
}

struct Running {
    senders: Vec<mpsc::Sender<NodeAssignments>>,
    workers: Vec<JoinHandle<Result<(), DistributionError>>>,
    shutdown_tx: watch::Sender<bool>,
    selector: Arc<dyn ShardSelector>,
    offer_timeout: Duration,
    poll_interval: Duration,
    close_timeout: Duration,
    local_mode: bool,
}

enum Lifecycle {
    Stopped,
    Active(Running),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> ServiceState {
        match self {
            Lifecycle::Stopped => ServiceState::Stopped,
            Lifecycle::Active(_) => ServiceState::Active,
            Lifecycle::Closed => ServiceState::Closed,
        }
    }
}

/// Sharded, best-effort assignment pusher.
///
/// Construct once, [`prepare`](Self::prepare) once, share behind an `Arc`,
/// and [`close`](Self::close) on shutdown.
pub struct AssignmentDistributionService {
    transport: Arc<dyn AssignmentTransport>,
    selector: Option<Arc<dyn ShardSelector>>,
    local_supervisors: Arc<LocalSupervisors>,
    active: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl AssignmentDistributionService {
    pub fn new(transport: Arc<dyn AssignmentTransport>) -> Self {
        Self {
            transport,
            selector: None,
            local_supervisors: Arc::new(LocalSupervisors::new()),
            active: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Stopped),
        }
    }

    /// Use a specific shard selector instead of a random one.
    pub fn with_shard_selector(mut self, selector: Arc<dyn ShardSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate shards, start one worker per shard and go active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn prepare(&self, config: &DistributionConfig) -> Result<(), DistributionError> {
        let mut lifecycle = self.lifecycle();
        if !matches!(*lifecycle, Lifecycle::Stopped) {
            return Err(DistributionError::InvalidState {
                expected: ServiceState::Stopped,
                actual: lifecycle.state(),
            });
        }

        let config = config.normalized();
        let shard_count = config.shard_count;
        let capacity = config.queue_capacity;
        let delivery = if config.local_mode {
            Delivery::Local(self.local_supervisors.clone())
        } else {
            Delivery::Remote(self.transport.clone())
        };
        let selector = self
            .selector
            .clone()
            .unwrap_or_else(|| Arc::new(RandomShardSelector::from_seed(config.shard_seed)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.active.store(true, Ordering::SeqCst);

        let mut senders = Vec::with_capacity(shard_count);
        let mut workers = Vec::with_capacity(shard_count);
        for shard in 0..shard_count {
            let (tx, rx) = mpsc::channel(capacity);
            let worker = ShardWorker {
                shard,
                rx,
                delivery: delivery.clone(),
                active: self.active.clone(),
                shutdown: shutdown_rx.clone(),
                poll_interval: config.poll_interval,
            };
            senders.push(tx);
            workers.push(tokio::spawn(worker.run()));
        }

        *lifecycle = Lifecycle::Active(Running {
            senders,
            workers,
            shutdown_tx,
            selector,
            offer_timeout: config.offer_timeout,
            poll_interval: config.poll_interval,
            close_timeout: config.close_timeout,
            local_mode: config.local_mode,
        });

        info!(
            shards = shard_count,
            queue_capacity = capacity,
            local_mode = config.local_mode,
            "Assignment distribution service started"
        );
        Ok(())
    }

    /// Queue assignments for delivery to a node.
    ///
    /// Waits up to the offer timeout for space on the selected shard and
    /// drops the push if none frees up. Never blocks longer than that.
    pub async fn add_assignments_for_node(
        &self,
        node: NodeId,
        assignments: impl Into<Arc<SupervisorAssignments>>,
    ) -> PushOutcome {
        let (shard, sender, offer_timeout) = {
            let lifecycle = self.lifecycle();
            let Lifecycle::Active(running) = &*lifecycle else {
                warn!(node = %node, state = %lifecycle.state(), "Rejecting assignment push, service is not active");
                return PushOutcome::Rejected;
            };
            let shard_count = running.senders.len();
            let shard = running.selector.select(shard_count) % shard_count;
            (shard, running.senders[shard].clone(), running.offer_timeout)
        };

        let push = NodeAssignments::new(node, assignments);
        match sender.send_timeout(push, offer_timeout).await {
            Ok(()) => {
                debug!(shard, "Queued assignments for node");
                PushOutcome::Enqueued { shard }
            }
            Err(SendTimeoutError::Timeout(push)) => {
                warn!(
                    node = %push.node(),
                    shard,
                    "Discard an assignment distribution for node because the target sub queue is full"
                );
                PushOutcome::Dropped { shard }
            }
            Err(SendTimeoutError::Closed(push)) => {
                warn!(
                    node = %push.node(),
                    shard,
                    "Discard an assignment distribution for node because the shard worker has stopped"
                );
                PushOutcome::Dropped { shard }
            }
        }
    }

    /// Register an in-process supervisor for local mode.
    ///
    /// May be called before or after `prepare`; pushes only consult it in
    /// local mode.
    pub fn add_local_supervisor(&self, supervisor: Arc<dyn AssignmentReceiver>) {
        self.local_supervisors.register(supervisor);
    }

    /// Stop all workers, discarding queued pushes.
    ///
    /// Waits at most the configured close timeout for workers to finish and
    /// only logs if they do not. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        self.active.store(false, Ordering::SeqCst);

        let running = {
            let mut lifecycle = self.lifecycle();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
                Lifecycle::Active(running) => running,
                Lifecycle::Stopped => {
                    info!("Assignment distribution service closed before it was prepared");
                    return;
                }
                Lifecycle::Closed => {
                    debug!("Assignment distribution service already closed");
                    return;
                }
            }
        };

        let Running {
            senders,
            workers,
            shutdown_tx,
            close_timeout,
            ..
        } = running;

        let _ = shutdown_tx.send(true);
        drop(senders);
        for worker in &workers {
            worker.abort();
        }

        let wait_all = async {
            for (shard, worker) in workers.into_iter().enumerate() {
                match worker.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(shard, error = %e, "Worker had already stopped"),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!(shard, error = %e, "Worker panicked"),
                }
            }
        };

        match tokio::time::timeout(close_timeout, wait_all).await {
            Ok(()) => info!("Assignment distribution service closed"),
            Err(_) => error!(
                timeout_secs = close_timeout.as_secs(),
                "Failed to close assignments distribute service within timeout"
            ),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle().state()
    }

    /// Number of shards, zero unless active.
    pub fn shard_count(&self) -> usize {
        match &*self.lifecycle() {
            Lifecycle::Active(running) => running.senders.len(),
            _ => 0,
        }
    }

    /// Number of shard workers still running.
    pub fn live_workers(&self) -> usize {
        match &*self.lifecycle() {
            Lifecycle::Active(running) => running
                .workers
                .iter()
                .filter(|worker| !worker.is_finished())
                .count(),
            _ => 0,
        }
    }

    /// Idle wait the workers use, once active.
    pub fn poll_interval(&self) -> Option<Duration> {
        match &*self.lifecycle() {
            Lifecycle::Active(running) => Some(running.poll_interval),
            _ => None,
        }
    }

    /// Whether the service was prepared in local mode.
    pub fn is_local_mode(&self) -> bool {
        match &*self.lifecycle() {
            Lifecycle::Active(running) => running.local_mode,
            _ => false,
        }
    }

    /// The registry consulted in local mode.
    pub fn local_supervisors(&self) -> &LocalSupervisors {
        &self.local_supervisors
    }
}

impl Drop for AssignmentDistributionService {
    fn drop(&mut self) {
        if let Lifecycle::Active(running) = &*self.lifecycle() {
            for worker in &running.workers {
                worker.abort();
            }
        }
    }
}
