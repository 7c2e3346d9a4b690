//! Diff engine
//!
//! Computes the zone changes that move the owned current state to the
//! target state. Every change replaces a whole A + TXT pair for one name;
//! the two record types are never patched separately.

use crate::model::{RecordGroup, RecordGroups, ResourceRecord};
use serde::Serialize;
use tracing::{debug, info};

/// What a change does to its DNS name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Name is new
    Addition,
    /// Name is no longer wanted
    Deletion,
    /// Name stays but its IPs changed
    Modification,
}

/// A unit of work submitted to the zone writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneChange {
    /// DNS managed zone the change is submitted to
    pub dns_zone: String,
    /// DNS name the change affects
    pub dns_name: String,
    /// Kind of change
    pub kind: ChangeKind,
    /// Records to add
    pub additions: Vec<ResourceRecord>,
    /// Records to delete
    pub deletions: Vec<ResourceRecord>,
}

impl ZoneChange {
    fn addition(target: &RecordGroup) -> Self {
        Self {
            dns_zone: target.dns_zone.clone(),
            dns_name: target.dns_name.clone(),
            kind: ChangeKind::Addition,
            additions: target.to_records(),
            deletions: Vec::new(),
        }
    }

    fn deletion(existing: &RecordGroup) -> Self {
        Self {
            dns_zone: existing.dns_zone.clone(),
            dns_name: existing.dns_name.clone(),
            kind: ChangeKind::Deletion,
            additions: Vec::new(),
            deletions: existing.to_records(),
        }
    }

    fn modification(existing: &RecordGroup, target: &RecordGroup) -> Self {
        Self {
            dns_zone: existing.dns_zone.clone(),
            dns_name: existing.dns_name.clone(),
            kind: ChangeKind::Modification,
            additions: target.to_records(),
            deletions: existing.to_records(),
        }
    }

    /// A change with nothing to add or delete
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Count of computed changes by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// Names only in the target
    pub additions: usize,
    /// Owned names no longer wanted
    pub deletions: usize,
    /// Names whose IPs changed
    pub modifications: usize,
}

impl ChangeSummary {
    /// Tally a change list
    pub fn of(changes: &[ZoneChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.kind {
                ChangeKind::Addition => summary.additions += 1,
                ChangeKind::Deletion => summary.deletions += 1,
                ChangeKind::Modification => summary.modifications += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.deletions + self.modifications
    }
}

/// Compute the changes from `existing` (already ownership-filtered) to `target`.
///
/// The result is ordered by DNS name. IPs are compared as sorted copies, so
/// insertion order never causes churn; labels are not compared at all.
pub fn diff(existing: &RecordGroups, target: &RecordGroups) -> Vec<ZoneChange> {
    debug!("Current record groups:");
    log_groups(existing);
    debug!("Target record groups:");
    log_groups(target);

    let mut changes = Vec::new();

    let mut names: Vec<&String> = existing.keys().chain(target.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        match (existing.get(name), target.get(name)) {
            (Some(current), None) => {
                info!("Change deletion: {} / {:?}", name, current.ips);
                changes.push(ZoneChange::deletion(current));
            }
            (None, Some(wanted)) => {
                info!("Change addition: {} / {:?}", name, wanted.ips);
                changes.push(ZoneChange::addition(wanted));
            }
            (Some(current), Some(wanted)) => {
                if current.same_ips(wanted) {
                    continue;
                }
                info!(
                    "Change modification: {} / {:?} -> {:?}",
                    name, current.ips, wanted.ips
                );
                if current.dns_zone == wanted.dns_zone {
                    changes.push(ZoneChange::modification(current, wanted));
                } else {
                    // The name moved between zones: each zone gets its own half
                    changes.push(ZoneChange::deletion(current));
                    changes.push(ZoneChange::addition(wanted));
                }
            }
            (None, None) => {}
        }
    }

    changes
}

fn log_groups(groups: &RecordGroups) {
    for group in groups.values() {
        debug!(
            "  {} {} {:?} {:?} {}",
            group.dns_zone, group.dns_name, group.ips, group.labels, group.ttl
        );
    }
}
