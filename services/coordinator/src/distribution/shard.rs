//! Shard selection and the per-shard worker loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempest_assignments::NodeAssignments;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use super::delivery::Delivery;
use crate::error::DistributionError;

/// Picks the shard a push is queued on.
///
/// The choice ignores the target node, so two pushes for the same node may
/// land on different shards and be delivered in either order.
pub trait ShardSelector: Send + Sync {
    /// A shard index in `0..shard_count`.
    fn select(&self, shard_count: usize) -> usize;
}

/// Uniform random shard selection.
pub struct RandomShardSelector {
    rng: Mutex<StdRng>,
}

impl RandomShardSelector {
    /// Reproducible selection from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Selection seeded from OS entropy.
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os_rng, Self::seeded)
    }
}

impl ShardSelector for RandomShardSelector {
    fn select(&self, shard_count: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..shard_count.max(1))
    }
}

impl fmt::Debug for RandomShardSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomShardSelector").finish_non_exhaustive()
    }
}

/// Worker state for one shard.
pub(crate) struct ShardWorker {
    pub(crate) shard: usize,
    pub(crate) rx: mpsc::Receiver<NodeAssignments>,
    pub(crate) delivery: Delivery,
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) poll_interval: Duration,
}

impl ShardWorker {
    /// Drain the shard's queue in FIFO order until shutdown.
    ///
    /// An empty queue is rechecked every poll interval so a cleared `active`
    /// flag is seen promptly. Returns an error only for a local-mode push to
    /// an unregistered node, which stops this shard.
    #[instrument(skip(self), fields(shard = self.shard))]
    pub(crate) async fn run(mut self) -> Result<(), DistributionError> {
        debug!("Starting assignment distribution worker");

        while self.active.load(Ordering::SeqCst) {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                next = timeout(self.poll_interval, self.rx.recv()) => next,
            };

            let push = match next {
                Ok(Some(push)) => push,
                Ok(None) => {
                    debug!("Shard queue closed");
                    break;
                }
                Err(_elapsed) => continue,
            };

            if let Err(e) = self.delivery.deliver(self.shard, push).await {
                error!(error = %e, "Assignment distribution worker stopped");
                return Err(e);
            }
        }

        info!("Assignment distribution worker exiting");
        Ok(())
    }
}
