//! Store configuration.

use crate::store::BatchMode;

/// Default buffer capacity in events (16 Ki).
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Default memory accounting unit in bytes (1 KiB).
///
/// In byte-size mode the store's memory budget is
/// `capacity * mem_unit`; the unit only scales the budget, it is not a
/// per-event size limit.
pub const DEFAULT_MEM_UNIT: usize = 1024;

/// Configuration for a [`MemoryEventStore`](crate::store::MemoryEventStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Buffer capacity in events. Must be a power of two; validated when
    /// the store starts.
    pub capacity: usize,

    /// Memory accounting unit in bytes (byte-size mode only).
    pub mem_unit: usize,

    /// How buffer fullness and batch sizing are measured.
    pub batch_mode: BatchMode,

    /// Whether schema-change events are delivered in dedicated batches.
    pub ddl_isolation: bool,

    /// Whether raw payload bytes are kept in the buffer.
    ///
    /// When disabled, payloads are dropped at `put` time; accounting still
    /// uses each event's recorded byte size.
    pub retain_payload: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            mem_unit: DEFAULT_MEM_UNIT,
            batch_mode: BatchMode::ItemCount,
            ddl_isolation: false,
            retain_payload: true,
        }
    }
}

impl StoreConfig {
    /// Item-count accounting with the given capacity.
    #[must_use]
    pub fn item_count(capacity: usize) -> Self {
        Self {
            capacity,
            batch_mode: BatchMode::ItemCount,
            ..Self::default()
        }
    }

    /// Byte-size accounting with the given capacity and unit.
    #[must_use]
    pub fn byte_size(capacity: usize, mem_unit: usize) -> Self {
        Self {
            capacity,
            mem_unit,
            batch_mode: BatchMode::ByteSize,
            ..Self::default()
        }
    }

    /// Sets DDL isolation.
    #[must_use]
    pub fn with_ddl_isolation(mut self, enabled: bool) -> Self {
        self.ddl_isolation = enabled;
        self
    }

    /// Sets raw-payload retention.
    #[must_use]
    pub fn with_retain_payload(mut self, enabled: bool) -> Self {
        self.retain_payload = enabled;
        self
    }

    /// The memory budget in bytes when byte-size accounting is active.
    #[must_use]
    pub fn memory_budget(&self) -> u64 {
        self.capacity as u64 * self.mem_unit as u64
    }
}
