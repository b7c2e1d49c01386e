//! Event store error types.

use thiserror::Error;

/// Errors that can occur during event store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured buffer capacity is not a power of two.
    ///
    /// Raised by [`MemoryEventStore::start`](crate::store::MemoryEventStore::start);
    /// no buffer is allocated when this is returned.
    #[error("buffer capacity must be a power of two, got {0}")]
    InvalidCapacity(usize),

    /// An ack was requested for a position that is not in the
    /// unacknowledged window. The store state is left unchanged.
    #[error("no matching ack position: {0}")]
    AckPositionNotFound(String),

    /// The store is stopped or was never started.
    ///
    /// Also returned to callers that were blocked in `put`/`get` when the
    /// store shut down underneath them.
    #[error("event store is not running")]
    NotRunning,
}
