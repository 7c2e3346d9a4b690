//! Desired state
//!
//! Turns the endpoints reported by an [`EndpointSource`](crate::traits::EndpointSource)
//! into target record groups, one per DNS name, each carrying one ownership
//! label per contributing endpoint.

use crate::model::{Endpoint, RecordGroup, RecordGroups};
use crate::ownership::ownership_label;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Builds target record groups from endpoints
#[derive(Debug, Clone)]
pub struct DesiredStateBuilder {
    /// Prefix of ownership labels
    label_prefix: String,

    /// TTL given to every target group
    ttl: u32,

    /// Whether names resolving to several IPs are published
    multiple_ip_record: bool,

    /// Compute zones managed by this reconciler
    compute_zones: HashSet<String>,
}

impl DesiredStateBuilder {
    /// Create a builder
    pub fn new<S: AsRef<str>>(
        label_prefix: impl Into<String>,
        ttl: u32,
        multiple_ip_record: bool,
        compute_zones: &[S],
    ) -> Self {
        Self {
            label_prefix: label_prefix.into(),
            ttl,
            multiple_ip_record,
            compute_zones: compute_zones
                .iter()
                .map(|zone| zone.as_ref().to_string())
                .collect(),
        }
    }

    /// Group endpoints by DNS name.
    ///
    /// `zone_suffixes` maps DNS managed zone to its DNS name; endpoints whose
    /// zone is missing from it are skipped.
    pub fn build(
        &self,
        zone_suffixes: &HashMap<String, String>,
        endpoints: &[Endpoint],
    ) -> RecordGroups {
        let mut groups = RecordGroups::new();

        for endpoint in endpoints {
            if !endpoint.is_complete() {
                warn!("Skip invalid endpoint: {:?}", endpoint);
                continue;
            }
            if !self.compute_zones.contains(&endpoint.compute_zone) {
                continue;
            }
            let Some(suffix) = zone_suffixes.get(&endpoint.dns_zone) else {
                warn!(
                    "Skip endpoint {} ({}): DNS zone {} is not managed",
                    endpoint.hostname, endpoint.ip, endpoint.dns_zone
                );
                continue;
            };

            let dns_name = format!(
                "{}.{}.",
                endpoint.hostname.trim_matches('.'),
                suffix.trim_matches('.')
            );
            let group = groups
                .entry(dns_name.clone())
                .or_insert_with(|| RecordGroup::new(dns_name, endpoint.dns_zone.clone(), self.ttl));
            group.ips.push(endpoint.ip.clone());
            group.labels.push(ownership_label(
                &self.label_prefix,
                &endpoint.compute_zone,
                &endpoint.ip,
            ));
        }

        if self.multiple_ip_record {
            groups
        } else {
            remove_multiple_ip_records(groups)
        }
    }
}

/// Drop every group resolving to more than one IP.
///
/// All-or-nothing per name: a group is never truncated to its first IP.
pub fn remove_multiple_ip_records(groups: RecordGroups) -> RecordGroups {
    groups
        .into_iter()
        .filter(|(dns_name, group)| {
            if group.ips.len() > 1 {
                warn!("Skip multiple IP record for {}: {:?}", dns_name, group.ips);
                return false;
            }
            true
        })
        .collect()
}
