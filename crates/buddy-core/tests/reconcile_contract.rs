//! Architectural Contract Test: Reconciliation Cycle
//!
//! This test verifies that one reconciliation cycle moves the zones to the
//! desired state with the minimal set of whole-pair changes.
//!
//! Constraints verified:
//! - New endpoints become an A + TXT pair with one label per contributing IP
//! - IP changes replace the whole pair, removed endpoints delete it
//! - A second cycle over unchanged inputs submits nothing
//! - A cycle can run against an explicit endpoint list instead of the source
//! - Records without buddy labels are never touched
//!
//! If this test fails, the zones will churn or lose records.

mod common;

use buddy_core::model::RecordType;
use buddy_core::{ChangeKind, ReconcileEvent, Reconciler};
use common::*;

async fn reconciler(
    provider: &FakeZoneProvider,
    source: &FakeEndpointSource,
) -> (Reconciler, tokio::sync::mpsc::Receiver<ReconcileEvent>) {
    Reconciler::new(
        Box::new(FakeZoneProvider::sharing_state_with(provider)),
        Box::new(FakeEndpointSource::sharing_state_with(source)),
        &zones_config(),
        &on_demand_engine(),
    )
    .await
    .expect("reconciler construction succeeds")
}

#[tokio::test]
async fn new_endpoints_are_published_with_ownership_labels() {
    let provider = FakeZoneProvider::new();
    let source = FakeEndpointSource::new(&["europe-west1-c", "europe-west1-d"]);
    source.set_endpoints(vec![
        internal("instance-1", "10.132.0.1", "europe-west1-c"),
        external("instance-1", "35.0.0.1", "europe-west1-c"),
        internal("lb", "10.132.0.2", "europe-west1-c"),
        internal("lb", "10.132.0.3", "europe-west1-d"),
    ]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.endpoints, 4);
    assert_eq!(report.changes.additions, 3);
    assert_eq!(report.applied, 3);
    assert_eq!(
        provider.values(INTERNAL_ZONE, "instance-1.internal.example.com.", RecordType::A),
        Some(vec!["10.132.0.1".to_string()])
    );
    assert_eq!(
        provider.values(INTERNAL_ZONE, "instance-1.internal.example.com.", RecordType::Txt),
        Some(vec!["\"buddy/europe-west1-c/10.132.0.1\"".to_string()])
    );
    assert_eq!(
        provider.values(EXTERNAL_ZONE, "instance-1.external.example.com.", RecordType::A),
        Some(vec!["35.0.0.1".to_string()])
    );
    assert_eq!(
        provider.values(INTERNAL_ZONE, "lb.internal.example.com.", RecordType::Txt),
        Some(vec![
            "\"buddy/europe-west1-c/10.132.0.2\"".to_string(),
            "\"buddy/europe-west1-d/10.132.0.3\"".to_string(),
        ])
    );
}

#[tokio::test]
async fn second_cycle_is_a_no_op() {
    let provider = FakeZoneProvider::new();
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    source.set_endpoints(vec![
        internal("instance-1", "10.132.0.1", "europe-west1-c"),
        internal("instance-2", "10.132.0.2", "europe-west1-c"),
    ]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    reconciler.synchronize().await.unwrap();
    let calls = provider.apply_call_count();
    assert_eq!(calls, 2);

    let report = reconciler.synchronize().await.unwrap();
    assert_eq!(report.changes.total(), 0);
    assert_eq!(report.owned, 2);
    assert_eq!(provider.apply_call_count(), calls);
}

#[tokio::test]
async fn ip_change_replaces_the_whole_pair() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "instance-1.internal.example.com.",
        &["10.132.0.1"],
        &["buddy/europe-west1-c/10.132.0.1"],
    );
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    source.set_endpoints(vec![internal("instance-1", "10.132.0.10", "europe-west1-c")]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.changes.modifications, 1);
    let submitted = provider.submitted();
    assert_eq!(submitted.len(), 1);
    let types = |records: &[buddy_core::ResourceRecord]| {
        records.iter().map(|r| r.record_type.clone()).collect::<Vec<_>>()
    };
    assert_eq!(types(&submitted[0].deletions), vec![RecordType::A, RecordType::Txt]);
    assert_eq!(types(&submitted[0].additions), vec![RecordType::A, RecordType::Txt]);
    assert_eq!(
        provider.values(INTERNAL_ZONE, "instance-1.internal.example.com.", RecordType::Txt),
        Some(vec!["\"buddy/europe-west1-c/10.132.0.10\"".to_string()])
    );

    let again = reconciler.synchronize().await.unwrap();
    assert_eq!(again.changes.total(), 0);
    assert_eq!(provider.apply_call_count(), 1);
}

#[tokio::test]
async fn removed_endpoint_deletes_its_records() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "instance-1.internal.example.com.",
        &["10.132.0.1"],
        &["buddy/europe-west1-c/10.132.0.1"],
    );
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    let (reconciler, mut events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.changes.deletions, 1);
    assert!(provider.records(INTERNAL_ZONE).is_empty());

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ReconcileEvent::ChangeApplied { kind, .. } = event {
            kinds.push(kind);
        }
    }
    assert_eq!(kinds, vec![ChangeKind::Deletion]);

    let again = reconciler.synchronize().await.unwrap();
    assert_eq!(again.changes.total(), 0);
    assert_eq!(again.owned, 0);
    assert_eq!(provider.apply_call_count(), 1);
}

#[tokio::test]
async fn explicit_endpoint_list_drives_a_cycle() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "instance-1.internal.example.com.",
        &["10.132.0.1"],
        &["buddy/europe-west1-c/10.132.0.1"],
    );
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    source.set_endpoints(vec![internal("instance-1", "10.132.0.1", "europe-west1-c")]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler
        .reconcile_endpoints(&[internal("instance-2", "10.132.0.2", "europe-west1-c")])
        .await
        .unwrap();

    assert_eq!(source.call_count(), 0);
    assert_eq!(report.endpoints, 1);
    assert_eq!(report.changes.additions, 1);
    assert_eq!(report.changes.deletions, 1);
    assert_eq!(
        provider.values(INTERNAL_ZONE, "instance-2.internal.example.com.", RecordType::A),
        Some(vec!["10.132.0.2".to_string()])
    );
    assert_eq!(
        provider.values(INTERNAL_ZONE, "instance-1.internal.example.com.", RecordType::A),
        None
    );

    let report = reconciler.reconcile_endpoints(&[]).await.unwrap();
    assert_eq!(report.changes.deletions, 1);
    assert!(provider.records(INTERNAL_ZONE).is_empty());
}

#[tokio::test]
async fn foreign_records_are_never_touched() {
    let provider = FakeZoneProvider::new();
    // Hand-written record, no labels
    provider.seed(
        INTERNAL_ZONE,
        a_record("legacy.internal.example.com.", 300, &["10.0.0.99"]),
    );
    // Written by a peer managing another compute zone
    provider.seed_pair(
        INTERNAL_ZONE,
        "peer.internal.example.com.",
        &["10.140.0.1"],
        &["buddy/us-central1-a/10.140.0.1"],
    );
    // Written by another tool using a different label prefix
    provider.seed_pair(
        INTERNAL_ZONE,
        "other.internal.example.com.",
        &["10.132.0.50"],
        &["other/europe-west1-c/10.132.0.50"],
    );
    let before = provider.records(INTERNAL_ZONE);

    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.owned, 0);
    assert_eq!(report.changes.total(), 0);
    assert_eq!(provider.apply_call_count(), 0);
    assert_eq!(provider.records(INTERNAL_ZONE), before);
}

#[tokio::test]
async fn growing_to_multiple_ips_is_one_modification() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "a.internal.example.com.",
        &["1.1.1.1"],
        &["buddy/us-c/1.1.1.1"],
    );
    let source = FakeEndpointSource::new(&["us-c"]);
    source.set_endpoints(vec![
        internal("a", "1.1.1.1", "us-c"),
        internal("a", "1.1.1.2", "us-c"),
    ]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.changes.modifications, 1);
    assert_eq!(provider.submitted().len(), 1);
    assert_eq!(
        provider.values(INTERNAL_ZONE, "a.internal.example.com.", RecordType::A),
        Some(vec!["1.1.1.1".to_string(), "1.1.1.2".to_string()])
    );
}

#[tokio::test]
async fn multiple_ip_records_can_be_disabled() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "lb.internal.example.com.",
        &["10.132.0.2"],
        &["buddy/europe-west1-c/10.132.0.2"],
    );
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    source.set_endpoints(vec![
        internal("lb", "10.132.0.2", "europe-west1-c"),
        internal("lb", "10.132.0.3", "europe-west1-c"),
        internal("single", "10.132.0.4", "europe-west1-c"),
    ]);
    let mut zones = zones_config();
    zones.multiple_ip_record = false;
    let (reconciler, _events) = Reconciler::new(
        Box::new(FakeZoneProvider::sharing_state_with(&provider)),
        Box::new(FakeEndpointSource::sharing_state_with(&source)),
        &zones,
        &on_demand_engine(),
    )
    .await
    .unwrap();

    reconciler.synchronize().await.unwrap();

    // Dropped from the target entirely, so the owned record goes away
    assert_eq!(
        provider.values(INTERNAL_ZONE, "lb.internal.example.com.", RecordType::A),
        None
    );
    assert_eq!(
        provider.values(INTERNAL_ZONE, "single.internal.example.com.", RecordType::A),
        Some(vec!["10.132.0.4".to_string()])
    );
}

#[tokio::test]
async fn endpoints_outside_configured_zones_are_skipped() {
    let provider = FakeZoneProvider::new();
    provider.add_zone("services-example-com", "services.example.com.");
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    source.set_endpoints(vec![
        buddy_core::Endpoint::new("api", "services-example-com", "10.132.0.7", "europe-west1-c"),
        internal("", "10.132.0.8", "europe-west1-c"),
        internal("web", "10.132.0.9", "us-central1-a"),
    ]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let report = reconciler.synchronize().await.unwrap();

    assert_eq!(report.target, 0);
    assert_eq!(provider.apply_call_count(), 0);
}

#[tokio::test]
async fn records_query_returns_owned_groups_only() {
    let provider = FakeZoneProvider::new();
    provider.seed_pair(
        INTERNAL_ZONE,
        "b.internal.example.com.",
        &["10.132.0.2"],
        &["buddy/europe-west1-c/10.132.0.2"],
    );
    provider.seed_pair(
        EXTERNAL_ZONE,
        "a.external.example.com.",
        &["35.0.0.1"],
        &["buddy/europe-west1-c/35.0.0.1"],
    );
    provider.seed(
        INTERNAL_ZONE,
        a_record("legacy.internal.example.com.", 300, &["10.0.0.99"]),
    );
    let source = FakeEndpointSource::new(&["europe-west1-c"]);
    let (reconciler, _events) = reconciler(&provider, &source).await;

    let records = reconciler.records().await.unwrap();

    let names: Vec<_> = records.iter().map(|g| g.dns_name.as_str()).collect();
    assert_eq!(names, vec!["a.external.example.com.", "b.internal.example.com."]);
    assert_eq!(records[1].dns_zone, INTERNAL_ZONE);
    assert_eq!(provider.apply_call_count(), 0);
    assert_eq!(source.call_count(), 0);
}
