//! # Sluice Core
//!
//! Bounded in-memory event store for change-data-capture pipelines.
//!
//! Sluice sits between an upstream log reader and pull-based downstream
//! consumers: the reader `put`s ordered change events into a fixed-capacity
//! ring, consumers `get` batches from a resumable position, process them,
//! and `ack` a position once durably handled. Unacknowledged data stays
//! replayable — a consumer that crashes mid-batch calls `rollback` (or just
//! reconnects) and receives the same window again.
//!
//! ## Guarantees
//!
//! - **Strict ordering**: events are delivered exactly in put order.
//! - **Monotonic acknowledgment**: acking a position frees everything up
//!   to and including it; acks never move backward.
//! - **Bounded memory**: capacity is enforced in event count or
//!   accumulated byte size, with blocking backpressure toward the
//!   producer.
//! - **DDL isolation** (optional): a schema-change event is never
//!   delivered in the same batch as row changes, so consumers cannot apply
//!   structural changes out of order relative to the rows they affect.
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::{Event, MemoryEventStore, Position, StoreConfig};
//!
//! let store = MemoryEventStore::new(StoreConfig::item_count(1024));
//! store.start()?;
//!
//! let event = Event::builder("mysql-bin.000001", 4)
//!     .execute_time_ms(1_700_000_000_000)
//!     .build();
//! store.put(vec![event])?;
//!
//! let batch = store.try_get(None, 16)?;
//! let last = Position::from_event(&batch.events[batch.len() - 1], false);
//! store.ack(&last)?;
//! # Ok::<(), sluice_core::StoreError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod position;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use event::{ChangeKind, EntryKind, Event, EventBuilder};
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use position::{Position, PositionRange};
pub use store::{BatchMode, EventBatch, MemoryEventStore};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
