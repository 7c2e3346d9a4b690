//! Core traits for the buddy reconciler
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ZoneReader`] / [`ZoneWriter`]: Read and change DNS managed zones
//! - [`EndpointSource`]: Discover the endpoints that should be published

pub mod endpoint_source;
pub mod zone_provider;

pub use endpoint_source::{EndpointSource, EndpointSourceFactory};
pub use zone_provider::{ZoneProvider, ZoneProviderFactory, ZoneReader, ZoneWriter};
