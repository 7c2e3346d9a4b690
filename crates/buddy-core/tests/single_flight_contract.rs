//! Architectural Contract Test: One Reconciliation In Flight
//!
//! The periodic loop and on-demand triggers share one reconciler. This test
//! verifies that their cycles never overlap against the same zones.
//!
//! Constraints verified:
//! - Concurrent synchronize() calls run one after the other
//! - Every caller gets its own complete cycle (callers wait, nothing is dropped)
//! - The later cycle sees the writes of the earlier one
//!
//! If this test fails, two cycles can race and submit conflicting changes.

mod common;

use buddy_core::Reconciler;
use common::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn concurrent_cycles_do_not_overlap() {
    let provider = FakeZoneProvider::new();
    let source =
        FakeEndpointSource::new(&["europe-west1-c"]).with_delay(Duration::from_millis(50));
    source.set_endpoints(vec![internal("instance-1", "10.132.0.1", "europe-west1-c")]);

    let (reconciler, _events) = Reconciler::new(
        Box::new(FakeZoneProvider::sharing_state_with(&provider)),
        Box::new(FakeEndpointSource::sharing_state_with(&source)),
        &zones_config(),
        &on_demand_engine(),
    )
    .await
    .expect("reconciler construction succeeds");
    let reconciler = Arc::new(reconciler);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move { reconciler.synchronize().await })
        })
        .collect();

    let mut additions = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        additions += report.changes.additions;
    }

    assert_eq!(source.call_count(), 3, "every caller runs its own cycle");
    assert_eq!(source.max_in_flight(), 1, "cycles never overlap");
    // Only the first cycle had work to do
    assert_eq!(additions, 1);
    assert_eq!(provider.apply_call_count(), 1);
}

#[tokio::test]
async fn records_query_does_not_wait_for_a_cycle() {
    let provider = FakeZoneProvider::new();
    let source =
        FakeEndpointSource::new(&["europe-west1-c"]).with_delay(Duration::from_millis(300));

    let (reconciler, _events) = Reconciler::new(
        Box::new(FakeZoneProvider::sharing_state_with(&provider)),
        Box::new(FakeEndpointSource::sharing_state_with(&source)),
        &zones_config(),
        &on_demand_engine(),
    )
    .await
    .unwrap();
    let reconciler = Arc::new(reconciler);

    let cycle = {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move { reconciler.synchronize().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let records = tokio::time::timeout(Duration::from_millis(200), reconciler.records())
        .await
        .expect("records() is read-only and not serialized with cycles")
        .unwrap();
    assert!(records.is_empty());

    cycle.await.unwrap().unwrap();
}
