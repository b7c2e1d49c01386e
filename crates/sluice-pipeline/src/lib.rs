//! # Sluice Pipeline
//!
//! Multi-stream plumbing around [`sluice_core`]: an explicit registry
//! mapping destination names to their event stores, per-stream
//! configuration from string property maps, and deterministic event
//! builders for tests.
//!
//! The registry is the seam toward the external ownership coordinator:
//! when leader election hands this process a stream, the coordinator calls
//! [`StreamRegistry::start`]; when ownership moves away it calls
//! [`StreamRegistry::stop`]. Everything else — wire protocol, filtering,
//! log parsing — lives outside this crate and talks to the stores it
//! obtains from the registry.
//!
//! ## Example
//!
//! ```rust
//! use sluice_pipeline::{StreamProperties, StreamRegistry};
//! use sluice_pipeline::config::{BATCH_MODE_KEY, CAPACITY_KEY};
//!
//! let registry = StreamRegistry::new();
//!
//! let mut properties = StreamProperties::new("orders");
//! properties.set(CAPACITY_KEY, "4096").set(BATCH_MODE_KEY, "bytes");
//! registry.register_from(&properties)?;
//!
//! // Ownership coordinator decided we own this stream now.
//! registry.start("orders")?;
//! let store = registry.store("orders")?;
//! assert!(store.is_running());
//! # registry.stop_all();
//! # Ok::<(), sluice_pipeline::PipelineError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod registry;
pub mod testing;

pub use config::StreamProperties;
pub use error::PipelineError;
pub use registry::StreamRegistry;
