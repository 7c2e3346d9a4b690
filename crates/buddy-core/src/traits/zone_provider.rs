// # Zone Provider Traits
//
// Defines the interface for reading and writing DNS managed zones.
//
// ## Implementations
//
// - Google Cloud DNS: `buddy-provider-clouddns` crate
//
// ## Usage
//
// ```rust,ignore
// use buddy_core::traits::{ZoneReader, ZoneWriter};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* ZoneProvider implementation */;
//
//     let zones = provider.managed_zones().await?;
//     let records = provider.record_sets("internal-example-com").await?;
//     provider.apply_change("internal-example-com", &additions, &deletions).await?;
//
//     Ok(())
// }
// ```

use crate::model::ResourceRecord;
use async_trait::async_trait;
use std::collections::HashMap;

/// Read side of a DNS provider
///
/// # Trust Level: Untrusted
///
/// Providers perform single-shot API calls and report the outcome. They do
/// not retry, cache between calls, or decide what needs to change; the
/// [`Reconciler`](crate::Reconciler) owns all of that and simply re-reads the
/// whole zone on the next cycle after a failure.
#[async_trait]
pub trait ZoneReader: Send + Sync {
    /// All DNS managed zones of the project
    ///
    /// # Returns
    ///
    /// Mapping of managed zone name to its DNS name (e.g.
    /// `"internal-example-com" -> "internal.example.com."`)
    async fn managed_zones(&self) -> Result<HashMap<String, String>, crate::Error>;

    /// Every record set of a managed zone
    ///
    /// Pagination is followed transparently (sequential page-token chaining).
    async fn record_sets(&self, dns_zone: &str) -> Result<Vec<ResourceRecord>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Write side of a DNS provider
#[async_trait]
pub trait ZoneWriter: Send + Sync {
    /// Submit one batch of additions and deletions against a zone
    ///
    /// # Returns
    ///
    /// - `Ok(())`: change accepted
    /// - `Err(Error::AlreadyExists)`: the zone already holds a record the
    ///   change tried to add (benign, the reconciler logs and continues)
    /// - `Err(_)`: any other failure, which aborts the current cycle
    async fn apply_change(
        &self,
        dns_zone: &str,
        additions: &[ResourceRecord],
        deletions: &[ResourceRecord],
    ) -> Result<(), crate::Error>;
}

/// A provider able to both read and write zones
pub trait ZoneProvider: ZoneReader + ZoneWriter {}

impl<T: ZoneReader + ZoneWriter> ZoneProvider for T {}

/// Helper trait for constructing zone providers from configuration
pub trait ZoneProviderFactory: Send + Sync {
    /// Create a ZoneProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn ZoneProvider>, crate::Error>;
}
