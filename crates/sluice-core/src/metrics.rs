//! Store operation metrics.
//!
//! Tracks, per operation kind, the cumulative affected-row count and the
//! origin timestamp of the most recently handled batch. The timestamps give
//! a cheap consumer-lag signal: `put` time minus `ack` time is how far the
//! consumer trails the upstream log in origin-clock milliseconds.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::event::Event;

/// Metrics maintained by a store instance.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    put_rows: AtomicU64,
    get_rows: AtomicU64,
    ack_rows: AtomicU64,
    put_exec_time_ms: AtomicI64,
    get_exec_time_ms: AtomicI64,
    ack_exec_time_ms: AtomicI64,
}

impl StoreMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_put(&self, rows: u64, exec_time_ms: i64) {
        self.put_rows.fetch_add(rows, Ordering::Relaxed);
        if exec_time_ms > 0 {
            self.put_exec_time_ms.store(exec_time_ms, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_get(&self, rows: u64, exec_time_ms: i64) {
        self.get_rows.fetch_add(rows, Ordering::Relaxed);
        if exec_time_ms > 0 {
            self.get_exec_time_ms.store(exec_time_ms, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_ack(&self, rows: u64, exec_time_ms: i64) {
        self.ack_rows.fetch_add(rows, Ordering::Relaxed);
        if exec_time_ms > 0 {
            self.ack_exec_time_ms.store(exec_time_ms, Ordering::Relaxed);
        }
    }

    /// Consumer lag in origin-clock milliseconds.
    ///
    /// Zero until both a put and an ack have been observed.
    #[must_use]
    pub fn consumer_lag_ms(&self) -> i64 {
        let put = self.put_exec_time_ms.load(Ordering::Relaxed);
        let ack = self.ack_exec_time_ms.load(Ordering::Relaxed);
        if put > 0 && ack > 0 {
            (put - ack).max(0)
        } else {
            0
        }
    }

    /// Takes a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            put_rows: self.put_rows.load(Ordering::Relaxed),
            get_rows: self.get_rows.load(Ordering::Relaxed),
            ack_rows: self.ack_rows.load(Ordering::Relaxed),
            put_exec_time_ms: self.put_exec_time_ms.load(Ordering::Relaxed),
            get_exec_time_ms: self.get_exec_time_ms.load(Ordering::Relaxed),
            ack_exec_time_ms: self.ack_exec_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Rows written by `put` since start.
    pub put_rows: u64,
    /// Rows delivered by `get` since start.
    pub get_rows: u64,
    /// Rows acknowledged since start.
    pub ack_rows: u64,
    /// Origin timestamp of the most recent put batch.
    pub put_exec_time_ms: i64,
    /// Origin timestamp of the most recent get batch.
    pub get_exec_time_ms: i64,
    /// Origin timestamp of the most recent ack.
    pub ack_exec_time_ms: i64,
}

/// Sums affected rows and picks the first usable origin timestamp from a
/// batch, the pair every record call wants.
pub(crate) fn profile(events: &[Event]) -> (u64, i64) {
    let mut rows = 0;
    let mut exec_time_ms = 0;
    for event in events {
        if exec_time_ms == 0 && event.execute_time_ms() > 0 {
            exec_time_ms = event.execute_time_ms();
        }
        rows += event.rows_affected();
    }
    (rows, exec_time_ms)
}
