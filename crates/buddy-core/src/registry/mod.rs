//! Plugin-based provider registry
//!
//! The registry allows zone providers and endpoint sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use buddy_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! buddy_provider_clouddns::register(&registry);
//! buddy_source_gce::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let source = registry.create_source(&config.source, &config.zones).await?;
//! ```

use crate::config::{ProviderConfig, SourceConfig, ZonesConfig};
use crate::error::{Error, Result};
use crate::traits::{EndpointSource, EndpointSourceFactory, ZoneProvider, ZoneProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Provider registry for plugin-based creation of zone providers and endpoint sources
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered zone provider factories
    providers: RwLock<HashMap<String, Box<dyn ZoneProviderFactory>>>,

    /// Registered endpoint source factories
    sources: RwLock<HashMap<String, Arc<dyn EndpointSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "clouddns")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn ZoneProviderFactory>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register an endpoint source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "gce")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn EndpointSourceFactory>,
    ) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a zone provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an endpoint source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn EndpointSource>)`: Created source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub async fn create_source(
        &self,
        config: &SourceConfig,
        zones: &ZonesConfig,
    ) -> Result<Box<dyn EndpointSource>> {
        let source_type = config.type_name();

        // Release the lock before calling async create
        let factory = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config, zones).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}
