//! Batch accounting: item-count vs. byte-size capacity tracking.
//!
//! In item-count mode fullness is purely a cursor-distance question and
//! the byte counters stay idle. In byte-size mode three counters mirror
//! the cursor trio: bytes put, bytes delivered, bytes acknowledged. Live
//! memory is `put_bytes - ack_bytes` and is kept under
//! `capacity * mem_unit` by the put-side admission check.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// How buffer fullness and batch sizing are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    /// Count events. Simple, but a run of oversized events can exhaust
    /// memory long before the slot count does.
    #[default]
    ItemCount,
    /// Count accumulated byte size, bounding total memory instead of
    /// event count.
    ByteSize,
}

impl BatchMode {
    /// True for item-count accounting.
    #[must_use]
    pub fn is_item_count(self) -> bool {
        matches!(self, BatchMode::ItemCount)
    }

    /// True for byte-size accounting.
    #[must_use]
    pub fn is_byte_size(self) -> bool {
        matches!(self, BatchMode::ByteSize)
    }
}

impl std::str::FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "items" | "item-count" => Ok(BatchMode::ItemCount),
            "bytes" | "byte-size" => Ok(BatchMode::ByteSize),
            other => Err(format!("unknown batch mode '{other}'")),
        }
    }
}

/// Byte counters for byte-size accounting.
///
/// All mutation happens inside the store's critical sections; the atomics
/// make the counters safely readable from outside them.
#[derive(Debug)]
pub struct MemoryAccountant {
    mode: BatchMode,
    unit: u64,
    budget: u64,
    put_bytes: AtomicU64,
    get_bytes: AtomicU64,
    ack_bytes: AtomicU64,
}

impl MemoryAccountant {
    /// Creates an accountant for the given mode and budget.
    #[must_use]
    pub fn new(mode: BatchMode, capacity: usize, mem_unit: usize) -> Self {
        Self {
            mode,
            unit: mem_unit as u64,
            budget: capacity as u64 * mem_unit as u64,
            put_bytes: AtomicU64::new(0),
            get_bytes: AtomicU64::new(0),
            ack_bytes: AtomicU64::new(0),
        }
    }

    /// The active accounting mode.
    #[must_use]
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Put-side admission: would accepting `incoming` bytes keep live
    /// memory under budget?
    ///
    /// Always true in item-count mode, where the slot check alone governs.
    #[must_use]
    pub fn admits(&self, incoming: u64) -> bool {
        if self.mode.is_item_count() {
            return true;
        }
        self.live_bytes() + incoming < self.budget
    }

    /// Get-side availability: do at least `batch_size` units of
    /// undelivered bytes exist?
    #[must_use]
    pub fn has_unread(&self, batch_size: usize) -> bool {
        let put = self.put_bytes.load(Ordering::Acquire);
        let get = self.get_bytes.load(Ordering::Acquire);
        put - get >= self.batch_byte_limit(batch_size)
    }

    /// The byte threshold corresponding to a batch size.
    #[must_use]
    pub fn batch_byte_limit(&self, batch_size: usize) -> u64 {
        batch_size as u64 * self.unit
    }

    /// Bytes currently held: put but not yet acknowledged.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        let put = self.put_bytes.load(Ordering::Acquire);
        let ack = self.ack_bytes.load(Ordering::Acquire);
        put - ack
    }

    /// Bytes put since start.
    #[must_use]
    pub fn put_bytes(&self) -> u64 {
        self.put_bytes.load(Ordering::Acquire)
    }

    /// Bytes delivered since start.
    #[must_use]
    pub fn get_bytes(&self) -> u64 {
        self.get_bytes.load(Ordering::Acquire)
    }

    /// Bytes acknowledged since start.
    #[must_use]
    pub fn ack_bytes(&self) -> u64 {
        self.ack_bytes.load(Ordering::Acquire)
    }

    pub(crate) fn record_put(&self, bytes: u64) {
        self.put_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn record_get(&self, bytes: u64) {
        self.get_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn record_ack(&self, bytes: u64) {
        self.ack_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Rewinds delivered bytes to the acknowledged mark (rollback).
    pub(crate) fn rewind_get_to_ack(&self) {
        self.get_bytes
            .store(self.ack_bytes.load(Ordering::Acquire), Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.put_bytes.store(0, Ordering::Release);
        self.get_bytes.store(0, Ordering::Release);
        self.ack_bytes.store(0, Ordering::Release);
    }
}
