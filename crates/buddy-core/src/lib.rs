// # buddy-core
//
// Core library of the buddy DNS zone reconciler.
//
// ## Architecture Overview
//
// buddy keeps A records (plus their ownership TXT records) in DNS managed
// zones in line with the addresses of cloud compute instances:
// - **ZoneReader / ZoneWriter**: Traits for reading and changing DNS zones
// - **EndpointSource**: Trait for discovering the desired hostname/IP pairs
// - **OwnershipFilter**: Decides which record groups this instance may touch
// - **DesiredStateBuilder**: Turns endpoints into target record groups
// - **diff**: Computes the minimal set of whole A + TXT pair replacements
// - **Reconciler**: Orchestrates one cycle and the periodic loop
// - **ProviderRegistry**: Plugin-based registry for providers and sources
//
// ## Design Principles
//
// 1. **Stateless cycles**: Every cycle starts from a fresh read of the zones
// 2. **Ownership first**: Records this instance did not create are never changed
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod desired;
pub mod diff;
pub mod engine;
pub mod error;
pub mod model;
pub mod ownership;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{BuddyConfig, EngineConfig, ProviderConfig, SourceConfig, ZonesConfig};
pub use desired::{DesiredStateBuilder, remove_multiple_ip_records};
pub use diff::{ChangeKind, ChangeSummary, ZoneChange, diff};
pub use engine::{CycleReport, ReconcileEvent, Reconciler};
pub use error::{Error, Result};
pub use model::{Endpoint, RecordGroup, RecordGroups, RecordType, ResourceRecord, group_records};
pub use ownership::{OwnershipFilter, ownership_label};
pub use registry::ProviderRegistry;
pub use traits::{EndpointSource, EndpointSourceFactory, ZoneProvider, ZoneProviderFactory, ZoneReader, ZoneWriter};
