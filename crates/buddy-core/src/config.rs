//! Configuration types for the buddy reconciler
//!
//! This module defines all configuration structures used throughout the workspace.
//! Configuration is an explicit value handed to constructors; nothing here is global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default prefix of ownership labels
pub const DEFAULT_LABEL_PREFIX: &str = "buddy";

/// Main buddy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuddyConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Endpoint source configuration
    pub source: SourceConfig,

    /// DNS zones and record settings
    pub zones: ZonesConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl BuddyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.source.validate()?;
        self.zones.validate()?;
        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Cloud DNS
    CloudDns {
        /// Project owning the managed zones
        project: String,
        /// OAuth2 bearer access token
        access_token: String,
        /// API base URL override (emulators, tests)
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::CloudDns {
                project,
                access_token,
                ..
            } => {
                if project.is_empty() {
                    return Err(crate::Error::config("Cloud DNS project cannot be empty"));
                }
                if access_token.is_empty() {
                    return Err(crate::Error::config(
                        "Cloud DNS access token cannot be empty",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                validate_custom("provider", factory, config)
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::CloudDns { .. } => "clouddns",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

// Tokens never reach logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::CloudDns {
                project, endpoint, ..
            } => f
                .debug_struct("CloudDns")
                .field("project", project)
                .field("access_token", &"<REDACTED>")
                .field("endpoint", endpoint)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Endpoint source configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Google Compute Engine instances
    ComputeEngine {
        /// Project owning the instances
        project: String,
        /// OAuth2 bearer access token
        access_token: String,
        /// Single compute zone to manage
        #[serde(default)]
        zone: Option<String>,
        /// Compute region whose zones are all managed
        #[serde(default)]
        region: Option<String>,
        /// API base URL override (emulators, tests)
        #[serde(default)]
        endpoint: Option<String>,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::ComputeEngine {
                project,
                access_token,
                zone,
                region,
                ..
            } => {
                if project.is_empty() {
                    return Err(crate::Error::config(
                        "Compute Engine project cannot be empty",
                    ));
                }
                if access_token.is_empty() {
                    return Err(crate::Error::config(
                        "Compute Engine access token cannot be empty",
                    ));
                }
                match (non_empty(zone), non_empty(region)) {
                    (None, None) => Err(crate::Error::config(
                        "Please provide a compute zone or a compute region",
                    )),
                    (Some(_), Some(_)) => Err(crate::Error::config(
                        "Please provide either a compute zone or a compute region, not both",
                    )),
                    _ => Ok(()),
                }
            }
            SourceConfig::Custom { factory, config } => validate_custom("source", factory, config),
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::ComputeEngine { .. } => "gce",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceConfig::ComputeEngine {
                project,
                zone,
                region,
                endpoint,
                ..
            } => f
                .debug_struct("ComputeEngine")
                .field("project", project)
                .field("access_token", &"<REDACTED>")
                .field("zone", zone)
                .field("region", region)
                .field("endpoint", endpoint)
                .finish(),
            SourceConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// DNS zones and record settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    /// Additional DNS managed zones to reconcile
    #[serde(default)]
    pub dns_zones: Vec<String>,

    /// Default DNS managed zone for internal IPs
    #[serde(default)]
    pub internal_ip_dns_zone: Option<String>,

    /// Default DNS managed zone for external IPs
    #[serde(default)]
    pub external_ip_dns_zone: Option<String>,

    /// TTL in seconds for managed records
    #[serde(default = "default_dns_ttl")]
    pub dns_ttl: u32,

    /// Allow several IPs in one A record
    #[serde(default = "default_multiple_ip_record")]
    pub multiple_ip_record: bool,

    /// Prefix used in ownership (TXT) labels
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            dns_zones: Vec::new(),
            internal_ip_dns_zone: None,
            external_ip_dns_zone: None,
            dns_ttl: default_dns_ttl(),
            multiple_ip_record: default_multiple_ip_record(),
            label_prefix: default_label_prefix(),
        }
    }
}

impl ZonesConfig {
    /// Every DNS managed zone this reconciler reads and writes
    pub fn zones_to_manage(&self) -> BTreeSet<String> {
        self.dns_zones
            .iter()
            .map(String::as_str)
            .chain(non_empty(&self.internal_ip_dns_zone))
            .chain(non_empty(&self.external_ip_dns_zone))
            .filter(|zone| !zone.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate the zone configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zones_to_manage().is_empty() {
            return Err(crate::Error::config("No DNS zones configured"));
        }
        if let (Some(internal), Some(external)) = (
            non_empty(&self.internal_ip_dns_zone),
            non_empty(&self.external_ip_dns_zone),
        ) && internal == external
        {
            return Err(crate::Error::config(format!(
                "Internal IP and external IP DNS zone names are the same: {}",
                internal
            )));
        }
        if self.label_prefix.is_empty() || self.label_prefix.contains('/') {
            return Err(crate::Error::config(format!(
                "Invalid label prefix '{}': must be non-empty and contain no '/'",
                self.label_prefix
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between periodic reconciliation cycles
    ///
    /// Set to 0 to disable the periodic loop; cycles then only run on demand.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn validate_custom(
    kind: &str,
    factory: &str,
    config: &serde_json::Value,
) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {} factory cannot be empty",
            kind
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {} config cannot be null",
            kind
        )));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn default_dns_ttl() -> u32 {
    300
}

fn default_multiple_ip_record() -> bool {
    true
}

fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}

fn default_sync_interval_secs() -> u64 {
    15
}

fn default_event_channel_capacity() -> usize {
    1000
}
