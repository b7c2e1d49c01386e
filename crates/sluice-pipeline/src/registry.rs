//! Explicit stream registry.
//!
//! One process typically serves several change streams (one per source
//! database instance). The registry is a constructed object owning the
//! mapping from destination name to its store, passed to whatever needs
//! it — there is no ambient global state, which keeps lifecycle and tests
//! explicit.
//!
//! The external ownership coordinator (leader election / HA) drives
//! [`start`](StreamRegistry::start) and [`stop`](StreamRegistry::stop)
//! when this process gains or loses a stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use sluice_core::{MemoryEventStore, StoreConfig};

use crate::config::StreamProperties;
use crate::error::PipelineError;

/// Registry of event stores keyed by destination.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<MemoryEventStore>>>,
}

impl StreamRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream with an explicit store configuration.
    ///
    /// The store is created stopped; the ownership coordinator starts it.
    ///
    /// # Errors
    ///
    /// [`PipelineError::DuplicateDestination`] when the destination is
    /// already registered.
    pub fn register(
        &self,
        destination: impl Into<String>,
        config: StoreConfig,
    ) -> Result<Arc<MemoryEventStore>, PipelineError> {
        let destination = destination.into();
        let mut streams = self.streams.write();
        if streams.contains_key(&destination) {
            return Err(PipelineError::DuplicateDestination(destination));
        }
        let store = Arc::new(MemoryEventStore::new(config));
        streams.insert(destination.clone(), Arc::clone(&store));
        tracing::debug!(destination = %destination, "stream registered");
        Ok(store)
    }

    /// Registers a stream from its property map.
    ///
    /// # Errors
    ///
    /// Property validation errors, or
    /// [`PipelineError::DuplicateDestination`].
    pub fn register_from(
        &self,
        properties: &StreamProperties,
    ) -> Result<Arc<MemoryEventStore>, PipelineError> {
        let config = properties.store_config()?;
        self.register(properties.destination(), config)
    }

    /// Looks up the store for a destination.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownDestination`] when nothing is registered
    /// under that name.
    pub fn store(&self, destination: &str) -> Result<Arc<MemoryEventStore>, PipelineError> {
        self.streams
            .read()
            .get(destination)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownDestination(destination.to_string()))
    }

    /// Lifecycle hook: this process became the owner of `destination`.
    ///
    /// # Errors
    ///
    /// Unknown destination, or a store configuration error surfaced at
    /// allocation time.
    pub fn start(&self, destination: &str) -> Result<(), PipelineError> {
        let store = self.store(destination)?;
        store.start()?;
        tracing::info!(destination = %destination, "stream started");
        Ok(())
    }

    /// Lifecycle hook: this process stopped owning `destination`.
    ///
    /// Buffered events are dropped; consumers resume from their own
    /// acknowledged positions on the next owner.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownDestination`].
    pub fn stop(&self, destination: &str) -> Result<(), PipelineError> {
        let store = self.store(destination)?;
        store.stop();
        tracing::info!(destination = %destination, "stream stopped");
        Ok(())
    }

    /// Removes a stream from the registry, stopping it first.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownDestination`].
    pub fn deregister(&self, destination: &str) -> Result<(), PipelineError> {
        let store = self
            .streams
            .write()
            .remove(destination)
            .ok_or_else(|| PipelineError::UnknownDestination(destination.to_string()))?;
        store.stop();
        tracing::debug!(destination = %destination, "stream deregistered");
        Ok(())
    }

    /// Stops every registered stream. Used at process shutdown.
    pub fn stop_all(&self) {
        for store in self.streams.read().values() {
            store.stop();
        }
        tracing::info!("all streams stopped");
    }

    /// Registered destination names, in no particular order.
    #[must_use]
    pub fn destinations(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }

    /// Number of registered streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    /// True when no stream is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = StreamRegistry::new();
        assert!(registry.is_empty());

        registry
            .register("orders", StoreConfig::item_count(16))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.store("orders").is_ok());
        assert!(matches!(
            registry.store("payments"),
            Err(PipelineError::UnknownDestination(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = StreamRegistry::new();
        registry
            .register("orders", StoreConfig::item_count(16))
            .unwrap();
        assert!(matches!(
            registry.register("orders", StoreConfig::item_count(16)),
            Err(PipelineError::DuplicateDestination(_))
        ));
    }

    #[test]
    fn test_lifecycle_hooks() {
        let registry = StreamRegistry::new();
        let store = registry
            .register("orders", StoreConfig::item_count(16))
            .unwrap();
        assert!(!store.is_running());

        registry.start("orders").unwrap();
        assert!(store.is_running());

        registry.stop("orders").unwrap();
        assert!(!store.is_running());
    }

    #[test]
    fn test_start_surfaces_invalid_capacity() {
        let registry = StreamRegistry::new();
        registry
            .register("orders", StoreConfig::item_count(12))
            .unwrap();
        assert!(registry.start("orders").is_err());
    }

    #[test]
    fn test_deregister_stops_store() {
        let registry = StreamRegistry::new();
        let store = registry
            .register("orders", StoreConfig::item_count(16))
            .unwrap();
        registry.start("orders").unwrap();

        registry.deregister("orders").unwrap();
        assert!(!store.is_running());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stop_all() {
        let registry = StreamRegistry::new();
        let a = registry
            .register("orders", StoreConfig::item_count(16))
            .unwrap();
        let b = registry
            .register("payments", StoreConfig::item_count(16))
            .unwrap();
        registry.start("orders").unwrap();
        registry.start("payments").unwrap();

        registry.stop_all();
        assert!(!a.is_running());
        assert!(!b.is_running());
    }
}
