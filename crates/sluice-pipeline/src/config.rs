//! Per-stream configuration from string properties.
//!
//! Deployments describe each stream as a flat key-value map (from a
//! properties file, environment, or an admin API); this module turns that
//! map into a validated [`StoreConfig`].

use std::collections::HashMap;
use std::fmt;

use sluice_core::{BatchMode, StoreConfig};

use crate::error::PipelineError;

/// Buffer capacity in events. Must be a power of two.
pub const CAPACITY_KEY: &str = "store.capacity";
/// Memory accounting unit in bytes.
pub const MEM_UNIT_KEY: &str = "store.memory.unit";
/// Accounting mode: `items` or `bytes`.
pub const BATCH_MODE_KEY: &str = "store.batch.mode";
/// Whether schema changes are delivered in dedicated batches.
pub const DDL_ISOLATION_KEY: &str = "store.ddl.isolation";
/// Whether raw payload bytes are kept in the buffer.
pub const RETAIN_PAYLOAD_KEY: &str = "store.retain.payload";

/// String key-value configuration for one stream.
#[derive(Debug, Clone, Default)]
pub struct StreamProperties {
    destination: String,
    properties: HashMap<String, String>,
}

impl StreamProperties {
    /// Creates empty properties for a destination.
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            properties: HashMap::new(),
        }
    }

    /// The stream (destination) identifier.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Sets a property, replacing any prior value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Gets a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Gets a property parsed as `T`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidProperty`] when the value does not parse.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, PipelineError>
    where
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(value) => value.parse::<T>().map(Some).map_err(|e| {
                PipelineError::InvalidProperty {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    /// Builds the store configuration, filling unset keys with defaults.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidProperty`] on unparseable values or a
    /// capacity that is not a power of two.
    pub fn store_config(&self) -> Result<StoreConfig, PipelineError> {
        let mut config = StoreConfig::default();
        if let Some(capacity) = self.get_parsed::<usize>(CAPACITY_KEY)? {
            if !capacity.is_power_of_two() {
                return Err(PipelineError::InvalidProperty {
                    key: CAPACITY_KEY.to_string(),
                    message: format!("{capacity} is not a power of two"),
                });
            }
            config.capacity = capacity;
        }
        if let Some(unit) = self.get_parsed::<usize>(MEM_UNIT_KEY)? {
            if unit == 0 {
                return Err(PipelineError::InvalidProperty {
                    key: MEM_UNIT_KEY.to_string(),
                    message: "must be positive".to_string(),
                });
            }
            config.mem_unit = unit;
        }
        if let Some(mode) = self.get_parsed::<BatchMode>(BATCH_MODE_KEY)? {
            config.batch_mode = mode;
        }
        if let Some(isolation) = self.get_parsed::<bool>(DDL_ISOLATION_KEY)? {
            config.ddl_isolation = isolation;
        }
        if let Some(retain) = self.get_parsed::<bool>(RETAIN_PAYLOAD_KEY)? {
            config.retain_payload = retain;
        }
        Ok(config)
    }
}
