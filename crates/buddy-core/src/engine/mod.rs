//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Reading the configured DNS zones and grouping their records per name
//! - Filtering out every group this instance does not own
//! - Building the target groups from the endpoint source
//! - Submitting the minimal set of zone changes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   endpoints   ┌────────────────────┐
//! │EndpointSource│──────────────▶│ DesiredStateBuilder│──── target ────┐
//! └──────────────┘               └────────────────────┘                │
//!                                                                      ▼
//! ┌──────────────┐   records     ┌────────────────────┐            ┌────────┐
//! │  ZoneReader  │──────────────▶│  OwnershipFilter   │── owned ──▶│  diff  │
//! └──────────────┘               └────────────────────┘            └────────┘
//!                                                                      │
//! ┌──────────────┐          one change per DNS name                    │
//! │  ZoneWriter  │◀────────────────────────────────────────────────────┘
//! └──────────────┘
//! ```
//!
//! ## Cycle semantics
//!
//! 1. Every cycle rebuilds all state from the zones; nothing is cached.
//! 2. Changes are submitted one by one; the first failure aborts the cycle.
//! 3. "Already exists" answers are logged and the cycle continues.
//! 4. Only one cycle runs at a time; concurrent callers wait their turn.

use crate::config::{EngineConfig, ZonesConfig};
use crate::desired::DesiredStateBuilder;
use crate::diff::{ChangeKind, ChangeSummary, ZoneChange, diff};
use crate::error::{Error, Result};
use crate::model::{Endpoint, RecordGroup, RecordGroups, group_records};
use crate::ownership::OwnershipFilter;
use crate::traits::{EndpointSource, ZoneProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Periodic loop started
    Started {
        compute_zones: usize,
        dns_zones: usize,
    },

    /// A reconciliation cycle started
    CycleStarted,

    /// A change was accepted by the zone writer
    ChangeApplied {
        dns_zone: String,
        dns_name: String,
        kind: ChangeKind,
    },

    /// The zone writer reported that a record already exists
    ChangeSkipped {
        dns_zone: String,
        dns_name: String,
        reason: String,
    },

    /// A cycle finished successfully
    CycleCompleted { summary: ChangeSummary },

    /// A cycle was aborted
    CycleFailed { error: String },

    /// Periodic loop stopped
    Stopped { reason: String },
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Endpoints reported by the source
    pub endpoints: usize,
    /// Record groups owned by this instance before the cycle
    pub owned: usize,
    /// Record groups wanted after the cycle
    pub target: usize,
    /// Changes computed by the diff
    pub changes: ChangeSummary,
    /// Changes accepted by the zone writer
    pub applied: usize,
    /// Changes answered with "already exists"
    pub already_exists: usize,
}

/// Keeps the configured DNS zones in line with the endpoint source
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`] (validates zone configuration)
/// 2. Share behind an `Arc` between the periodic loop and on-demand callers
/// 3. Run the loop with [`Reconciler::run()`] or [`Reconciler::run_until()`]
///
/// ## Threading
///
/// [`Reconciler::synchronize()`] holds a mutex for the whole pass, so the
/// periodic loop and an on-demand trigger never touch the zones at the same
/// time. A caller arriving mid-cycle waits, then runs its own cycle.
pub struct Reconciler {
    /// Zone reader/writer
    provider: Arc<dyn ZoneProvider>,

    /// Desired endpoints
    source: Arc<dyn EndpointSource>,

    /// DNS managed zones to reconcile
    dns_zones: BTreeSet<String>,

    /// Ownership rule derived from the source's compute zones
    ownership: OwnershipFilter,

    /// Target state builder
    desired: DesiredStateBuilder,

    /// Interval of the periodic loop (zero = disabled)
    sync_interval: Duration,

    /// Held for the duration of one cycle
    cycle_lock: Mutex<()>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// Zone configuration is validated here, once: every configured DNS zone
    /// must exist in the provider's project, and the source must cover at
    /// least one compute zone.
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields reconciler events
    pub async fn new(
        provider: Box<dyn ZoneProvider>,
        source: Box<dyn EndpointSource>,
        zones: &ZonesConfig,
        engine: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        zones.validate()?;

        let compute_zones = source.compute_zones().to_vec();
        if compute_zones.is_empty() {
            return Err(Error::config(format!(
                "Endpoint source {} manages no compute zones",
                source.source_name()
            )));
        }

        let dns_zones = zones.zones_to_manage();
        let project_zones = provider.managed_zones().await?;
        for zone in &dns_zones {
            if !project_zones.contains_key(zone) {
                let mut known: Vec<_> = project_zones.keys().collect();
                known.sort();
                return Err(Error::config(format!(
                    "Configured DNS zone '{}' is not a managed zone. Managed zones {:?}",
                    zone, known
                )));
            }
        }

        info!(
            "Reconciler: provider {}, source {}, dns zones {:?}, compute zones {:?}",
            provider.provider_name(),
            source.source_name(),
            dns_zones,
            compute_zones
        );

        let (tx, rx) = mpsc::channel(engine.event_channel_capacity.max(1));

        let reconciler = Self {
            provider: Arc::from(provider),
            source: Arc::from(source),
            ownership: OwnershipFilter::new(&zones.label_prefix, &compute_zones),
            desired: DesiredStateBuilder::new(
                zones.label_prefix.clone(),
                zones.dns_ttl,
                zones.multiple_ip_record,
                &compute_zones,
            ),
            dns_zones,
            sync_interval: Duration::from_secs(engine.sync_interval_secs),
            cycle_lock: Mutex::new(()),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// DNS managed zones this reconciler reads and writes
    pub fn dns_zones(&self) -> &BTreeSet<String> {
        &self.dns_zones
    }

    /// Compute zones whose endpoints this reconciler owns
    pub fn compute_zones(&self) -> &[String] {
        self.source.compute_zones()
    }

    /// Run one full reconciliation cycle against the endpoint source
    ///
    /// Blocks while another cycle is in flight.
    pub async fn synchronize(&self) -> Result<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let started_at = Utc::now();
        self.emit_event(ReconcileEvent::CycleStarted);
        info!("Synchronizing DNS entries...");

        let result = match self.source.endpoints().await {
            Ok(endpoints) => self.reconcile(&endpoints, started_at).await,
            Err(e) => Err(e),
        };
        self.finish_cycle(result)
    }

    /// Run one reconciliation cycle against an explicit endpoint list
    pub async fn reconcile_endpoints(&self, endpoints: &[Endpoint]) -> Result<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        let started_at = Utc::now();
        self.emit_event(ReconcileEvent::CycleStarted);

        let result = self.reconcile(endpoints, started_at).await;
        self.finish_cycle(result)
    }

    /// Record groups currently owned by this instance, sorted by name
    ///
    /// Read-only: no diff is computed and nothing is written.
    pub async fn records(&self) -> Result<Vec<RecordGroup>> {
        let current = self.current_groups().await?;
        Ok(self.ownership.filter(current).into_values().collect())
    }

    /// Endpoints currently reported by the source
    pub async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        self.source.endpoints().await
    }

    /// Run the periodic loop until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Run the periodic loop until `shutdown` completes
    ///
    /// A cycle in progress is never interrupted; shutdown is observed
    /// between cycles. Failed cycles are logged and the loop keeps going.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.emit_event(ReconcileEvent::Started {
            compute_zones: self.compute_zones().len(),
            dns_zones: self.dns_zones.len(),
        });
        tokio::pin!(shutdown);

        if self.sync_interval.is_zero() {
            warn!("Synchronization loop is disabled.");
            shutdown.await;
            self.emit_event(ReconcileEvent::Stopped {
                reason: "Shutdown signal".to_string(),
            });
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.synchronize().await {
                        error!("Sync loop error: {}", e);
                    }
                    debug!("Sleeping for {:?}...", self.sync_interval);
                }

                _ = &mut shutdown => {
                    info!("Exited synchronization loop.");
                    self.emit_event(ReconcileEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Diff and apply; the caller holds the cycle lock
    async fn reconcile(
        &self,
        endpoints: &[Endpoint],
        started_at: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let project_zones = self.provider.managed_zones().await?;
        let suffixes: HashMap<String, String> = project_zones
            .into_iter()
            .filter(|(zone, _)| self.dns_zones.contains(zone))
            .collect();

        let owned = self.ownership.filter(self.current_groups().await?);
        let target = self.desired.build(&suffixes, endpoints);
        let changes = diff(&owned, &target);

        let mut report = CycleReport {
            started_at,
            finished_at: started_at,
            endpoints: endpoints.len(),
            owned: owned.len(),
            target: target.len(),
            changes: ChangeSummary::of(&changes),
            applied: 0,
            already_exists: 0,
        };

        for change in &changes {
            self.apply_change(change, &mut report).await?;
        }

        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Submit one change; "already exists" is not an error
    async fn apply_change(&self, change: &ZoneChange, report: &mut CycleReport) -> Result<()> {
        if change.is_empty() {
            info!("Didn't submit change for {} (no changes)", change.dns_name);
            return Ok(());
        }

        match self
            .provider
            .apply_change(&change.dns_zone, &change.additions, &change.deletions)
            .await
        {
            Ok(()) => {
                report.applied += 1;
                self.emit_event(ReconcileEvent::ChangeApplied {
                    dns_zone: change.dns_zone.clone(),
                    dns_name: change.dns_name.clone(),
                    kind: change.kind,
                });
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                warn!(
                    "Cannot update some DNS records in zone {} ({}): {}",
                    change.dns_zone, change.dns_name, e
                );
                report.already_exists += 1;
                self.emit_event(ReconcileEvent::ChangeSkipped {
                    dns_zone: change.dns_zone.clone(),
                    dns_name: change.dns_name.clone(),
                    reason: e.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                error!(
                    "Error applying change for {} in zone {}: {}",
                    change.dns_name, change.dns_zone, e
                );
                Err(e)
            }
        }
    }

    /// Read and group every configured zone
    async fn current_groups(&self) -> Result<RecordGroups> {
        let mut groups = RecordGroups::new();
        for zone in &self.dns_zones {
            let records = self.provider.record_sets(zone).await?;
            debug!("Read {} record sets from zone {}", records.len(), zone);
            group_records(zone, records, &mut groups);
        }
        Ok(groups)
    }

    fn finish_cycle(&self, result: Result<CycleReport>) -> Result<CycleReport> {
        match &result {
            Ok(report) => {
                info!(
                    "Synchronization done: {} addition(s), {} deletion(s), {} modification(s), {} already existing",
                    report.changes.additions,
                    report.changes.deletions,
                    report.changes.modifications,
                    report.already_exists
                );
                self.emit_event(ReconcileEvent::CycleCompleted {
                    summary: report.changes,
                });
            }
            Err(e) => {
                self.emit_event(ReconcileEvent::CycleFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    /// Emit a reconciler event
    fn emit_event(&self, event: ReconcileEvent) {
        // A closed channel just means nobody is listening
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
