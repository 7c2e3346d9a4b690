// # Endpoint Source Trait
//
// Defines the interface for discovering the desired hostname/IP pairs.
//
// ## Implementations
//
// - Google Compute Engine: `buddy-source-gce` crate

use crate::model::Endpoint;
use async_trait::async_trait;

/// Supplies the endpoints that should exist in DNS
///
/// # Trust Level: Untrusted
///
/// Like zone providers, sources only list what they see. Validation of the
/// returned endpoints (missing fields, unmanaged zones) is done by the
/// reconciler.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Compute zones this source covers
    ///
    /// Fixed at construction; the reconciler derives its ownership prefixes
    /// from this list.
    fn compute_zones(&self) -> &[String];

    /// All endpoints currently derived from the managed compute zones
    async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing endpoint sources from configuration
///
/// Creation is async because sources may need to query the cloud API to
/// resolve their compute zones.
#[async_trait]
pub trait EndpointSourceFactory: Send + Sync {
    /// Create an EndpointSource instance
    ///
    /// # Parameters
    ///
    /// - `config`: Source configuration
    /// - `zones`: DNS zone settings (default zones for internal/external IPs)
    async fn create(
        &self,
        config: &crate::config::SourceConfig,
        zones: &crate::config::ZonesConfig,
    ) -> Result<Box<dyn EndpointSource>, crate::Error>;
}
