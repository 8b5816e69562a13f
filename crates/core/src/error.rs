//! Error types for relay
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every variant here is local and recoverable: the operation that produced it
//! had no side effect. Mismatched participation in a collective call is not an
//! error this type can describe; it hangs instead.

use crate::types::RepresentationId;
use std::io;
use thiserror::Error;

/// Result type alias for relay operations
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Error types for the relay control plane
#[derive(Debug, Error)]
pub enum RelayError {
    /// The addressed representation is not registered with the store or view
    #[error("Unknown representation: {0}")]
    UnknownRepresentation(RepresentationId),

    /// The representation is already registered
    #[error("Representation already registered: {0}")]
    AlreadyRegistered(RepresentationId),

    /// A composite representation has no child under this key
    #[error("Unknown composite key: {0:?}")]
    UnknownCompositeKey(String),

    /// A streaming command was issued with no streaming-capable view tracked
    #[error("No streaming-capable view is currently tracked")]
    NoStreamingTarget,

    /// A representation's own data-preparation step failed
    #[error("Representation {id} failed to update: {reason}")]
    RepresentationFailed {
        /// Failing representation
        id: RepresentationId,
        /// Failure description
        reason: String,
    },

    /// The upstream pipeline source failed to produce data
    #[error("Source error: {0}")]
    Source(String),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (config file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl RelayError {
    /// Create a source error from any displayable reason
    pub fn source(reason: impl Into<String>) -> Self {
        RelayError::Source(reason.into())
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        RelayError::Config(reason.into())
    }

    /// Create an invalid-operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        RelayError::InvalidOperation(reason.into())
    }

    /// Whether this error names a representation the callee does not know
    pub fn is_unknown_representation(&self) -> bool {
        matches!(self, RelayError::UnknownRepresentation(_))
    }
}
