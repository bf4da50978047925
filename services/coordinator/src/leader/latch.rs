//! Leadership-election handle.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

/// Handle on this replica's participation in leader election.
///
/// Closing the latch is the only way a replica steps down.
#[async_trait]
pub trait LeaderLatch: Send + Sync {
    /// Release the latch, giving up leadership.
    async fn close(&self) -> io::Result<()>;

    /// Whether this replica currently holds leadership.
    fn has_leadership(&self) -> bool;
}

/// In-memory latch for local mode and tests.
#[derive(Debug, Default)]
pub struct MemoryLeaderLatch {
    leader: AtomicBool,
    fail_close: AtomicBool,
    closes: AtomicU32,
}

impl MemoryLeaderLatch {
    /// A latch that already holds leadership.
    pub fn elected() -> Self {
        let latch = Self::default();
        latch.leader.store(true, Ordering::SeqCst);
        latch
    }

    /// Make subsequent closes fail with an I/O error.
    pub fn fail_on_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of successful closes.
    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaderLatch for MemoryLeaderLatch {
    async fn close(&self) -> io::Result<()> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "latch session lost while closing",
            ));
        }
        self.leader.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_leadership(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}
