// # Record groups
//
// A `RecordGroup` is the reconciler's view of one DNS name: the address
// record and its companion ownership-marker (TXT) record merged together.
// Groups are rebuilt from scratch every cycle, once from the zone (current)
// and once from the endpoint source (target).

use super::record::{RecordType, ResourceRecord, unquote};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record groups keyed by fully-qualified DNS name
pub type RecordGroups = BTreeMap<String, RecordGroup>;

/// A desired hostname/IP pair derived from a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Name relative to the DNS zone
    pub hostname: String,

    /// DNS managed zone the record belongs to
    pub dns_zone: String,

    /// IPv4 address
    pub ip: String,

    /// Compute zone of the instance the endpoint was derived from
    pub compute_zone: String,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(
        hostname: impl Into<String>,
        dns_zone: impl Into<String>,
        ip: impl Into<String>,
        compute_zone: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            dns_zone: dns_zone.into(),
            ip: ip.into(),
            compute_zone: compute_zone.into(),
        }
    }

    /// All four fields must be non-empty
    pub fn is_complete(&self) -> bool {
        !self.hostname.is_empty()
            && !self.dns_zone.is_empty()
            && !self.ip.is_empty()
            && !self.compute_zone.is_empty()
    }
}

/// A + TXT records of one DNS name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordGroup {
    /// Fully-qualified DNS name (trailing dot)
    pub dns_name: String,

    /// DNS managed zone holding the records
    pub dns_zone: String,

    /// Address record values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,

    /// TTL shared by both records
    #[serde(default)]
    pub ttl: u32,

    /// Unquoted ownership labels (`<prefix>/<compute zone>/<ip>`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl RecordGroup {
    /// Create an empty group for a name
    pub fn new(dns_name: impl Into<String>, dns_zone: impl Into<String>, ttl: u32) -> Self {
        Self {
            dns_name: dns_name.into(),
            dns_zone: dns_zone.into(),
            ips: Vec::new(),
            ttl,
            labels: Vec::new(),
        }
    }

    /// Copy of the IPs in canonical (sorted) order
    pub fn sorted_ips(&self) -> Vec<String> {
        let mut ips = self.ips.clone();
        ips.sort();
        ips
    }

    /// True when both groups publish the same IPs, ignoring order.
    ///
    /// Labels are derived data and never take part in the comparison.
    pub fn same_ips(&self, other: &RecordGroup) -> bool {
        self.sorted_ips() == other.sorted_ips()
    }

    /// Whether the group carries an address record
    pub fn has_address(&self) -> bool {
        !self.ips.is_empty()
    }

    /// The A + TXT pair representing this group on the wire
    pub fn to_records(&self) -> Vec<ResourceRecord> {
        vec![
            ResourceRecord::a(self.dns_name.clone(), self.ttl, self.ips.clone()),
            ResourceRecord::txt(self.dns_name.clone(), self.ttl, &self.labels),
        ]
    }
}

/// Merge the records of one zone into `groups`.
///
/// A records set `ips`/`ttl`, TXT records set `labels`; anything else is
/// ignored. Both record kinds land in the same group because they are keyed
/// by name, so input order does not matter.
pub fn group_records<I>(dns_zone: &str, records: I, groups: &mut RecordGroups)
where
    I: IntoIterator<Item = ResourceRecord>,
{
    for record in records {
        if !matches!(record.record_type, RecordType::A | RecordType::Txt) {
            continue;
        }
        let group = groups
            .entry(record.name.clone())
            .or_insert_with(|| RecordGroup::new(record.name.clone(), dns_zone, 0));

        match record.record_type {
            RecordType::A => {
                group.ips = record.rrdatas;
                group.ttl = record.ttl;
            }
            RecordType::Txt => {
                group.labels = record
                    .rrdatas
                    .iter()
                    .map(|value| unquote(value).to_string())
                    .collect();
            }
            RecordType::Other(_) => {}
        }
    }
}
