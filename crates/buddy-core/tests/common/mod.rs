//! Test doubles and common utilities for reconciler contract tests
//!
//! The fakes keep their state behind `Arc`s so a test can hand one copy to
//! the reconciler and keep another for assertions (`sharing_state_with`).

#![allow(dead_code)]

use buddy_core::config::{EngineConfig, ZonesConfig};
use buddy_core::error::{Error, Result};
use buddy_core::model::{Endpoint, RecordType, ResourceRecord};
use buddy_core::traits::{EndpointSource, ZoneReader, ZoneWriter};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INTERNAL_ZONE: &str = "internal-example-com";
pub const INTERNAL_SUFFIX: &str = "internal.example.com.";
pub const EXTERNAL_ZONE: &str = "external-example-com";
pub const EXTERNAL_SUFFIX: &str = "external.example.com.";

/// A change as received by the fake writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedChange {
    pub dns_zone: String,
    pub additions: Vec<ResourceRecord>,
    pub deletions: Vec<ResourceRecord>,
}

impl SubmittedChange {
    /// Names touched by this change
    pub fn names(&self) -> HashSet<String> {
        self.additions
            .iter()
            .chain(&self.deletions)
            .map(|r| r.name.clone())
            .collect()
    }
}

#[derive(Default)]
struct FakeZones {
    suffixes: HashMap<String, String>,
    records: HashMap<String, Vec<ResourceRecord>>,
    submitted: Vec<SubmittedChange>,
    failing_names: HashSet<String>,
}

/// In-memory DNS project behaving like a transactional zone API
///
/// Deletions must match an existing record exactly and additions must not
/// collide with an existing (name, type); a collision answers
/// `Error::AlreadyExists`. Changes are applied atomically.
pub struct FakeZoneProvider {
    zones: Arc<Mutex<FakeZones>>,
    apply_call_count: Arc<AtomicUsize>,
    read_call_count: Arc<AtomicUsize>,
}

impl FakeZoneProvider {
    /// Project holding the internal and external zones, both empty
    pub fn new() -> Self {
        let provider = Self {
            zones: Arc::new(Mutex::new(FakeZones::default())),
            apply_call_count: Arc::new(AtomicUsize::new(0)),
            read_call_count: Arc::new(AtomicUsize::new(0)),
        };
        provider.add_zone(INTERNAL_ZONE, INTERNAL_SUFFIX);
        provider.add_zone(EXTERNAL_ZONE, EXTERNAL_SUFFIX);
        provider
    }

    /// Create a new FakeZoneProvider that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            zones: Arc::clone(&other.zones),
            apply_call_count: Arc::clone(&other.apply_call_count),
            read_call_count: Arc::clone(&other.read_call_count),
        }
    }

    pub fn add_zone(&self, zone: &str, suffix: &str) {
        let mut zones = self.zones.lock().unwrap();
        zones.suffixes.insert(zone.to_string(), suffix.to_string());
        zones.records.entry(zone.to_string()).or_default();
    }

    /// Put a record straight into a zone, bypassing change validation
    pub fn seed(&self, zone: &str, record: ResourceRecord) {
        self.zones
            .lock()
            .unwrap()
            .records
            .entry(zone.to_string())
            .or_default()
            .push(record);
    }

    /// Seed an A + TXT pair the way buddy writes it
    pub fn seed_pair(&self, zone: &str, name: &str, ips: &[&str], labels: &[&str]) {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        self.seed(zone, a_record(name, 300, ips));
        self.seed(zone, ResourceRecord::txt(name, 300, &labels));
    }

    /// Any change touching `name` fails with a provider error
    pub fn fail_on(&self, name: &str) {
        self.zones
            .lock()
            .unwrap()
            .failing_names
            .insert(name.to_string());
    }

    pub fn clear_failures(&self) {
        self.zones.lock().unwrap().failing_names.clear();
    }

    pub fn records(&self, zone: &str) -> Vec<ResourceRecord> {
        self.zones
            .lock()
            .unwrap()
            .records
            .get(zone)
            .cloned()
            .unwrap_or_default()
    }

    /// Values of the record of a given name and type, if present
    pub fn values(&self, zone: &str, name: &str, record_type: RecordType) -> Option<Vec<String>> {
        self.records(zone)
            .into_iter()
            .find(|r| r.name == name && r.record_type == record_type)
            .map(|r| r.rrdatas)
    }

    pub fn submitted(&self) -> Vec<SubmittedChange> {
        self.zones.lock().unwrap().submitted.clone()
    }

    /// Get the number of times apply_change() was called
    pub fn apply_call_count(&self) -> usize {
        self.apply_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times record_sets() was called
    pub fn read_call_count(&self) -> usize {
        self.read_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ZoneReader for FakeZoneProvider {
    async fn managed_zones(&self) -> Result<HashMap<String, String>> {
        Ok(self.zones.lock().unwrap().suffixes.clone())
    }

    async fn record_sets(&self, dns_zone: &str) -> Result<Vec<ResourceRecord>> {
        self.read_call_count.fetch_add(1, Ordering::SeqCst);
        self.zones
            .lock()
            .unwrap()
            .records
            .get(dns_zone)
            .cloned()
            .ok_or_else(|| Error::provider("fake", format!("unknown zone {}", dns_zone)))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[async_trait::async_trait]
impl ZoneWriter for FakeZoneProvider {
    async fn apply_change(
        &self,
        dns_zone: &str,
        additions: &[ResourceRecord],
        deletions: &[ResourceRecord],
    ) -> Result<()> {
        self.apply_call_count.fetch_add(1, Ordering::SeqCst);
        let mut zones = self.zones.lock().unwrap();

        let change = SubmittedChange {
            dns_zone: dns_zone.to_string(),
            additions: additions.to_vec(),
            deletions: deletions.to_vec(),
        };
        if change.names().iter().any(|n| zones.failing_names.contains(n)) {
            return Err(Error::provider("fake", "injected failure"));
        }
        zones.submitted.push(change);

        let Some(current) = zones.records.get(dns_zone) else {
            return Err(Error::provider("fake", format!("unknown zone {}", dns_zone)));
        };
        let mut next = current.clone();
        for deletion in deletions {
            let Some(pos) = next.iter().position(|r| r == deletion) else {
                return Err(Error::provider("fake", format!("conditionNotMet: {:?}", deletion)));
            };
            next.remove(pos);
        }
        for addition in additions {
            if next
                .iter()
                .any(|r| r.name == addition.name && r.record_type == addition.record_type)
            {
                return Err(Error::already_exists(
                    dns_zone,
                    format!("The resource '{}' already exists", addition.name),
                ));
            }
            next.push(addition.clone());
        }
        zones.records.insert(dns_zone.to_string(), next);
        Ok(())
    }
}

/// Endpoint source returning whatever the test last set
pub struct FakeEndpointSource {
    compute_zones: Vec<String>,
    endpoints: Arc<Mutex<Vec<Endpoint>>>,
    fail: Arc<Mutex<bool>>,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeEndpointSource {
    pub fn new(compute_zones: &[&str]) -> Self {
        Self {
            compute_zones: compute_zones.iter().map(|s| s.to_string()).collect(),
            endpoints: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(false)),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every endpoints() call take this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Create a new FakeEndpointSource that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            compute_zones: other.compute_zones.clone(),
            endpoints: Arc::clone(&other.endpoints),
            fail: Arc::clone(&other.fail),
            delay: other.delay,
            call_count: Arc::clone(&other.call_count),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
        }
    }

    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        *self.endpoints.lock().unwrap() = endpoints;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Get the number of times endpoints() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of endpoints() calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EndpointSource for FakeEndpointSource {
    fn compute_zones(&self) -> &[String] {
        &self.compute_zones
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if *self.fail.lock().unwrap() {
            return Err(Error::provider("fake-source", "instances unavailable"));
        }
        Ok(self.endpoints.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "fake-source"
    }
}

pub fn a_record(name: &str, ttl: u32, ips: &[&str]) -> ResourceRecord {
    ResourceRecord::a(name, ttl, ips.iter().map(|s| s.to_string()).collect())
}

pub fn internal(hostname: &str, ip: &str, compute_zone: &str) -> Endpoint {
    Endpoint::new(hostname, INTERNAL_ZONE, ip, compute_zone)
}

pub fn external(hostname: &str, ip: &str, compute_zone: &str) -> Endpoint {
    Endpoint::new(hostname, EXTERNAL_ZONE, ip, compute_zone)
}

/// Zone settings managing both test zones
pub fn zones_config() -> ZonesConfig {
    ZonesConfig {
        internal_ip_dns_zone: Some(INTERNAL_ZONE.to_string()),
        external_ip_dns_zone: Some(EXTERNAL_ZONE.to_string()),
        ..ZonesConfig::default()
    }
}

/// Engine settings with the periodic loop disabled
pub fn on_demand_engine() -> EngineConfig {
    EngineConfig {
        sync_interval_secs: 0,
        event_channel_capacity: 100,
    }
}
