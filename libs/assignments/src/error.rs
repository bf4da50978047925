//! Errors surfaced by assignment receivers.

use thiserror::Error;

/// Errors a supervisor may return when handed assignments.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The supervisor has shut down and no longer accepts assignments.
    #[error("supervisor {0} is stopped")]
    Stopped(String),
}
