//! Error types for the mapping layer
//!
//! This module defines all error types surfaced by the core API.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! A missing row on `find`/`get_proxy` is NOT an error: those operations
//! return `Ok(None)`. `NotFound` is reserved for operations that require the
//! row to exist (refresh of a proxy whose row was deleted meanwhile).

use thiserror::Error;

/// Result type alias for mapping-layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the mapping layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A key component is null, missing, out of place, or the component
    /// count does not match the declared layout
    #[error("Invalid key components for '{property}': {reason}")]
    InvalidKeyComponents {
        /// Name of the key property being encoded
        property: String,
        /// Human-readable reason
        reason: String,
    },

    /// Encoded composite bytes could not be decoded
    #[error("Malformed composite key: {0}")]
    MalformedCompositeKey(String),

    /// The entity is in the wrong proxy state for the requested operation
    #[error("Unexpected proxy state: expected {expected}, got {actual}")]
    UnexpectedProxyState {
        /// State the operation requires
        expected: &'static str,
        /// State the entity was in
        actual: &'static str,
    },

    /// Entity or primary key failed structural validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A value could not be serialized or deserialized by its codec
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No metadata registered for the requested entity type
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The row backing a managed entity no longer exists
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// The statement executor failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidKeyComponents` error
    pub fn invalid_key(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidKeyComponents {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Build a `MalformedCompositeKey` error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedCompositeKey(reason.into())
    }

    /// Build a `Validation` error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }

    /// Build a `Serialization` error
    pub fn serialization(reason: impl Into<String>) -> Self {
        Error::Serialization(reason.into())
    }

    /// Build a `Storage` error
    pub fn storage(reason: impl Into<String>) -> Self {
        Error::Storage(reason.into())
    }

    /// Build a `Config` error
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config(reason.into())
    }

    /// Stable reason code, usable in logs and metrics labels
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::InvalidKeyComponents { .. } => "invalid_key_components",
            Error::MalformedCompositeKey(_) => "malformed_composite_key",
            Error::UnexpectedProxyState { .. } => "unexpected_proxy_state",
            Error::Validation(_) => "validation",
            Error::Serialization(_) => "serialization",
            Error::UnknownEntity(_) => "unknown_entity",
            Error::NotFound(_) => "not_found",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
        }
    }
}
