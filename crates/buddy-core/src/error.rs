//! Error types for the buddy reconciler
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for buddy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the buddy reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-specific error (zone reader/writer or endpoint source)
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The zone already holds a record the change tried to add.
    ///
    /// Not a failure from the reconciler's point of view: the cycle logs it and continues.
    #[error("Record already exists in zone {zone}: {message}")]
    AlreadyExists {
        /// DNS zone the change was submitted to
        zone: String,
        /// Provider message
        message: String,
    },

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an "already exists" condition for a zone
    pub fn already_exists(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this is the benign "record already exists" condition
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether this error should stop the process at startup
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
