// # Compute Engine Endpoint Source
//
// This crate derives the desired hostname/IP pairs from Google Compute
// Engine instances.
//
// ## Opting in
//
// An instance is published when it carries a metadata entry or a network tag
// named after one of the keys below. Metadata values override the defaults;
// tags only opt in.
//
// | key                    | meaning                                           |
// |------------------------|---------------------------------------------------|
// | `internal-ip-hostname` | hostname for the internal IP (default: instance)  |
// | `internal-ip-dns-zone` | DNS zone for the internal IP (default: configured) |
// | `external-ip-hostname` | hostname for the external IP (default: instance)  |
// | `external-ip-dns-zone` | DNS zone for the external IP (default: configured) |
//
// ## Compute zones
//
// The source manages either a single compute zone or every zone of a region.
// The list is resolved once at construction and never changes afterwards.

pub mod client;
pub mod instance;

pub use client::{COMPUTE_API_BASE, ComputeEngineClient};
pub use instance::{Instance, InstanceError};

use async_trait::async_trait;
use buddy_core::ProviderRegistry;
use buddy_core::config::{SourceConfig, ZonesConfig};
use buddy_core::model::Endpoint;
use buddy_core::traits::{EndpointSource, EndpointSourceFactory};
use buddy_core::{Error, Result};
use client::SOURCE_NAME;

/// Which compute zones a source manages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeZoneSelection {
    /// One compute zone
    Zone(String),
    /// Every compute zone of a region
    Region(String),
}

impl ComputeZoneSelection {
    /// Exactly one of zone or region must be set
    pub fn from_options(zone: Option<&str>, region: Option<&str>) -> Result<Self> {
        let zone = zone.filter(|z| !z.is_empty());
        let region = region.filter(|r| !r.is_empty());
        match (zone, region) {
            (Some(zone), None) => Ok(Self::Zone(zone.to_string())),
            (None, Some(region)) => Ok(Self::Region(region.to_string())),
            (None, None) => Err(Error::config(
                "Please provide a compute zone or a compute region",
            )),
            (Some(_), Some(_)) => Err(Error::config(
                "Please provide either a compute zone or a compute region, not both",
            )),
        }
    }
}

/// Endpoint source backed by Compute Engine instances
#[derive(Debug)]
pub struct ComputeEngineSource {
    client: ComputeEngineClient,

    /// Resolved compute zones
    compute_zones: Vec<String>,

    /// Default DNS zone for internal IPs
    internal_ip_dns_zone: Option<String>,

    /// Default DNS zone for external IPs
    external_ip_dns_zone: Option<String>,
}

impl ComputeEngineSource {
    /// Resolve the managed compute zones and create the source
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the zone or region does not exist or the region has no zones
    /// - `Error::Provider` if the API cannot be reached
    pub async fn new(
        client: ComputeEngineClient,
        selection: ComputeZoneSelection,
        zones: &ZonesConfig,
    ) -> Result<Self> {
        let compute_zones = match &selection {
            ComputeZoneSelection::Zone(zone) => vec![client.zone(zone).await.map_err(not_found_as_config)?],
            ComputeZoneSelection::Region(region) => {
                let zones = client.region_zones(region).await.map_err(not_found_as_config)?;
                if zones.is_empty() {
                    return Err(Error::config(format!("Region {} has no compute zones", region)));
                }
                zones
            }
        };

        tracing::info!(
            "Compute Engine source: project {}, compute zones {:?}",
            client.project(),
            compute_zones
        );

        Ok(Self {
            client,
            compute_zones,
            internal_ip_dns_zone: zones.internal_ip_dns_zone.clone().filter(|z| !z.is_empty()),
            external_ip_dns_zone: zones.external_ip_dns_zone.clone().filter(|z| !z.is_empty()),
        })
    }
}

fn not_found_as_config(err: Error) -> Error {
    match err {
        Error::NotFound(message) => Error::config(message),
        other => other,
    }
}

#[async_trait]
impl EndpointSource for ComputeEngineSource {
    fn compute_zones(&self) -> &[String] {
        &self.compute_zones
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut endpoints = Vec::new();

        for zone in &self.compute_zones {
            let instances = self.client.instances(zone).await?;
            let before = endpoints.len();
            for instance in &instances {
                endpoints.extend(instance.endpoints(
                    self.internal_ip_dns_zone.as_deref(),
                    self.external_ip_dns_zone.as_deref(),
                ));
            }
            tracing::debug!(
                "Compute zone {}: {} instances, {} endpoints",
                zone,
                instances.len(),
                endpoints.len() - before
            );
        }

        Ok(endpoints)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Factory for creating Compute Engine sources
pub struct ComputeEngineFactory;

#[async_trait]
impl EndpointSourceFactory for ComputeEngineFactory {
    async fn create(
        &self,
        config: &SourceConfig,
        zones: &ZonesConfig,
    ) -> Result<Box<dyn EndpointSource>> {
        match config {
            SourceConfig::ComputeEngine {
                project,
                access_token,
                zone,
                region,
                endpoint,
            } => {
                let selection =
                    ComputeZoneSelection::from_options(zone.as_deref(), region.as_deref())?;
                let mut client = ComputeEngineClient::new(project.clone(), access_token.clone())?;
                if let Some(endpoint) = endpoint.as_deref().filter(|e| !e.is_empty()) {
                    tracing::warn!("Compute Engine API endpoint overridden: {}", endpoint);
                    client = client.with_base_url(endpoint);
                }
                let source = ComputeEngineSource::new(client, selection, zones).await?;
                Ok(Box::new(source))
            }
            _ => Err(Error::config("Invalid config for Compute Engine source")),
        }
    }
}

/// Register the Compute Engine source with a registry
///
/// # Example
///
/// ```rust
/// use buddy_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// buddy_source_gce::register(&registry);
/// assert!(registry.has_source("gce"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_source(SOURCE_NAME, Box::new(ComputeEngineFactory));
}
