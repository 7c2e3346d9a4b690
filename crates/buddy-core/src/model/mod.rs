// # Data model
//
// Records as they appear in a zone, endpoints as they come from the
// endpoint source, and the per-name `RecordGroup` both are reduced to.

pub mod group;
pub mod record;

pub use group::{Endpoint, RecordGroup, RecordGroups, group_records};
pub use record::{RecordType, ResourceRecord};
