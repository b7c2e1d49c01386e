//! Cursor tracking over the store's sequence space.
//!
//! Three monotonic cursors index into an unbounded sequence space:
//! `put` (last written), `get` (last delivered), `ack` (last acknowledged).
//! The ordering invariant `ack <= get <= put` holds in every reachable
//! state; a violation is a bug, not a condition to recover from.

use std::sync::atomic::{AtomicI64, Ordering};

/// Cursor value before anything was ever stored.
pub const INIT_SEQUENCE: i64 = -1;

/// The put/get/ack cursor trio.
///
/// `put` is only advanced inside the store's producer critical section and
/// uses a plain publish; `get` and `ack` advance by compare-and-swap so a
/// lost race is detected rather than silently absorbed.
#[derive(Debug)]
pub struct SequenceTracker {
    put: AtomicI64,
    get: AtomicI64,
    ack: AtomicI64,
}

impl SequenceTracker {
    /// Creates a tracker with all cursors at [`INIT_SEQUENCE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            put: AtomicI64::new(INIT_SEQUENCE),
            get: AtomicI64::new(INIT_SEQUENCE),
            ack: AtomicI64::new(INIT_SEQUENCE),
        }
    }

    /// Sequence of the most recently written event.
    #[must_use]
    pub fn put(&self) -> i64 {
        self.put.load(Ordering::Acquire)
    }

    /// Sequence of the most recently delivered event.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.get.load(Ordering::Acquire)
    }

    /// Sequence of the most recently acknowledged event.
    #[must_use]
    pub fn ack(&self) -> i64 {
        self.ack.load(Ordering::Acquire)
    }

    /// Publishes a new put cursor after the slots were written.
    ///
    /// The release store pairs with the acquire load in readers, so slot
    /// contents are visible before the advanced cursor is.
    pub fn publish_put(&self, sequence: i64) {
        debug_assert!(sequence >= self.put.load(Ordering::Relaxed));
        self.put.store(sequence, Ordering::Release);
    }

    /// Advances the get cursor from `current` to `to`.
    ///
    /// Returns false when another consumer advanced it first; the caller
    /// must treat the read as lost, not retry internally.
    pub fn advance_get(&self, current: i64, to: i64) -> bool {
        self.get
            .compare_exchange(current, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Advances the ack cursor from `current` to `to`.
    pub fn advance_ack(&self, current: i64, to: i64) -> bool {
        self.ack
            .compare_exchange(current, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Rewinds the get cursor to the ack cursor, discarding the
    /// read-but-unacknowledged window.
    pub fn rewind_get_to_ack(&self) {
        self.get.store(self.ack.load(Ordering::Acquire), Ordering::Release);
    }

    /// Resets all cursors to [`INIT_SEQUENCE`].
    pub fn reset(&self) {
        self.put.store(INIT_SEQUENCE, Ordering::Release);
        self.get.store(INIT_SEQUENCE, Ordering::Release);
        self.ack.store(INIT_SEQUENCE, Ordering::Release);
    }

    /// Asserts the cursor ordering invariant in debug builds.
    pub fn check_ordering(&self) {
        debug_assert!(
            self.ack() <= self.get() && self.get() <= self.put(),
            "cursor invariant violated: ack={} get={} put={}",
            self.ack(),
            self.get(),
            self.put()
        );
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
