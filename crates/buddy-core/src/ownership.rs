//! Ownership filtering
//!
//! DNS has no notion of who wrote a record, so every record buddy writes is
//! paired with a TXT record listing `<prefix>/<compute zone>/<ip>` labels.
//! A reconciler only ever touches groups whose labels all point at compute
//! zones it manages; groups without labels were never written by buddy.

use crate::model::{RecordGroup, RecordGroups};
use tracing::debug;

/// Build the ownership label for one contributing endpoint
pub fn ownership_label(label_prefix: &str, compute_zone: &str, ip: &str) -> String {
    format!("{}/{}/{}", label_prefix, compute_zone, ip)
}

/// Decides which record groups belong to this reconciler instance
#[derive(Debug, Clone)]
pub struct OwnershipFilter {
    /// `<prefix>/<compute zone>/` for each managed compute zone
    prefixes: Vec<String>,
}

impl OwnershipFilter {
    /// Create a filter for the given label prefix and managed compute zones
    pub fn new<S: AsRef<str>>(label_prefix: &str, compute_zones: &[S]) -> Self {
        let mut prefixes: Vec<String> = compute_zones
            .iter()
            .map(|zone| format!("{}/{}/", label_prefix, zone.as_ref()))
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    /// A group is owned iff it has labels and every label matches a managed zone
    pub fn owns(&self, group: &RecordGroup) -> bool {
        // TXT without A: nothing a full pair replacement could act on
        if !group.has_address() || group.labels.is_empty() {
            return false;
        }
        group
            .labels
            .iter()
            .all(|label| self.prefixes.iter().any(|prefix| label.starts_with(prefix)))
    }

    /// Keep only owned groups
    pub fn filter(&self, groups: RecordGroups) -> RecordGroups {
        groups
            .into_iter()
            .filter(|(_, group)| {
                let owned = self.owns(group);
                if !owned {
                    debug!(
                        "Skip not owned record {} {:?} labels={:?}",
                        group.dns_name, group.ips, group.labels
                    );
                }
                owned
            })
            .collect()
    }
}
