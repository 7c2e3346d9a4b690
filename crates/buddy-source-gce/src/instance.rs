// # Compute instances
//
// Conversion of Compute Engine API instances into the reduced view buddy
// needs, and derivation of endpoints from instance metadata and tags.

use buddy_core::model::Endpoint;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Metadata/tag key selecting the DNS zone of the internal IP
pub const KEY_INTERNAL_IP_DNS_ZONE: &str = "internal-ip-dns-zone";
/// Metadata/tag key selecting the DNS zone of the external IP
pub const KEY_EXTERNAL_IP_DNS_ZONE: &str = "external-ip-dns-zone";
/// Metadata/tag key overriding the hostname of the internal IP
pub const KEY_INTERNAL_IP_HOSTNAME: &str = "internal-ip-hostname";
/// Metadata/tag key overriding the hostname of the external IP
pub const KEY_EXTERNAL_IP_HOSTNAME: &str = "external-ip-hostname";

/// Instance as returned by `instances.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInstance {
    pub name: String,
    #[serde(default)]
    pub metadata: Option<ApiMetadata>,
    #[serde(default)]
    pub tags: Option<ApiTags>,
    #[serde(default)]
    pub network_interfaces: Vec<ApiNetworkInterface>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMetadata {
    #[serde(default)]
    pub items: Vec<ApiMetadataItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMetadataItem {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTags {
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNetworkInterface {
    #[serde(rename = "networkIP", default)]
    pub network_ip: String,
    #[serde(default)]
    pub access_configs: Vec<ApiAccessConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAccessConfig {
    #[serde(rename = "natIP", default)]
    pub nat_ip: Option<String>,
}

/// Reasons an instance cannot be published
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Skip instance '{name}'. Instance must have one internal IP, found {count} network interfaces")]
    NetworkInterfaces { name: String, count: usize },

    #[error("Skip instance '{name}'. Multiple external IPs are not supported")]
    MultipleExternalIps { name: String },
}

/// The parts of a compute instance endpoints are derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub compute_zone: String,
    pub internal_ip: String,
    pub external_ip: Option<String>,
    pub metadata: HashMap<String, String>,
    pub tags: HashSet<String>,
}

impl Instance {
    /// Reduce an API instance: exactly one network interface, at most one access config
    pub fn from_api(api: ApiInstance, compute_zone: &str) -> Result<Self, InstanceError> {
        let [interface] = api.network_interfaces.as_slice() else {
            return Err(InstanceError::NetworkInterfaces {
                count: api.network_interfaces.len(),
                name: api.name,
            });
        };
        if interface.access_configs.len() > 1 {
            return Err(InstanceError::MultipleExternalIps { name: api.name });
        }

        let internal_ip = interface.network_ip.clone();
        let external_ip = interface
            .access_configs
            .first()
            .and_then(|config| config.nat_ip.clone())
            .filter(|ip| !ip.is_empty());

        let metadata = api
            .metadata
            .map(|m| m.items)
            .unwrap_or_default()
            .into_iter()
            .map(|item| (item.key, item.value.unwrap_or_default()))
            .collect();
        let tags = api
            .tags
            .map(|t| t.items)
            .unwrap_or_default()
            .into_iter()
            .collect();

        Ok(Self {
            name: api.name,
            compute_zone: compute_zone.to_string(),
            internal_ip,
            external_ip,
            metadata,
            tags,
        })
    }

    fn has_key(&self, key: &str) -> bool {
        self.metadata.contains_key(key) || self.tags.contains(key)
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Endpoint for one of the instance's IPs, if the instance opted in
    fn endpoint(
        &self,
        key_hostname: &str,
        key_dns_zone: &str,
        default_dns_zone: Option<&str>,
        ip: Option<&str>,
    ) -> Option<Endpoint> {
        let ip = ip.filter(|ip| !ip.is_empty())?;
        if !self.has_key(key_hostname) && !self.has_key(key_dns_zone) {
            return None;
        }

        let hostname = self.value(key_hostname).unwrap_or(self.name.as_str());
        let dns_zone = self
            .value(key_dns_zone)
            .or(default_dns_zone.filter(|z| !z.is_empty()));

        match dns_zone {
            Some(dns_zone) if !hostname.is_empty() => Some(Endpoint::new(
                hostname,
                dns_zone,
                ip,
                self.compute_zone.as_str(),
            )),
            _ => {
                warn!(
                    "Skip record. Default DNS zone was not configured: instance name {}, IP {}",
                    self.name, ip
                );
                None
            }
        }
    }

    /// Internal and external endpoints of the instance
    ///
    /// An instance whose two endpoints would publish the same name in the
    /// same DNS zone yields nothing.
    pub fn endpoints(
        &self,
        internal_ip_dns_zone: Option<&str>,
        external_ip_dns_zone: Option<&str>,
    ) -> Vec<Endpoint> {
        let internal = self.endpoint(
            KEY_INTERNAL_IP_HOSTNAME,
            KEY_INTERNAL_IP_DNS_ZONE,
            internal_ip_dns_zone,
            Some(self.internal_ip.as_str()),
        );
        let external = self.endpoint(
            KEY_EXTERNAL_IP_HOSTNAME,
            KEY_EXTERNAL_IP_DNS_ZONE,
            external_ip_dns_zone,
            self.external_ip.as_deref(),
        );

        if let (Some(i), Some(e)) = (&internal, &external)
            && i.dns_zone == e.dns_zone
            && i.hostname == e.hostname
        {
            warn!(
                "Instance {} has the same dns name for externalIP {} and internalIP {}",
                self.name, e.ip, i.ip
            );
            return Vec::new();
        }

        internal.into_iter().chain(external).collect()
    }
}
