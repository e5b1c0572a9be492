//! Error taxonomy for the synchronization core
//!
//! Every failure surfaced to callers is a [`SyncError`] carrying its kind
//! and message. `InvalidTransition` and client-detectable `Validation`
//! never reach the network; `Unauthorized` clears the session centrally
//! before it is re-raised.

use crate::status::Status;
use serde::{Deserialize, Serialize};

/// A field-level validation failure reported by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Canonical field name
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main synchronization error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Credential missing or rejected; the session has already been cleared
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Entity does not exist remotely
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure or timeout; retry is the caller's choice
    #[error("network error: {0}")]
    Network(String),

    /// Remote rejected the payload
    #[error("validation failed: {message}")]
    Validation {
        /// Summary message
        message: String,
        /// Per-field failures, when the remote itemized them
        field_errors: Vec<FieldError>,
    },

    /// Another actor holds or changed the entity
    #[error("conflict: {0}")]
    Conflict(String),

    /// Status change outside the workflow graph; rejected before the network
    #[error("illegal status transition: {} -> {to}", .from.map_or("<none>", Status::as_str))]
    InvalidTransition {
        /// Current stored status, if any
        from: Option<Status>,
        /// Requested target
        to: Status,
    },

    /// Remote failed internally; message preserved verbatim
    #[error("server error: {0}")]
    ServerError(String),

    /// Anything the classifier could not place
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Error kind, for matching without destructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`SyncError::Unauthorized`]
    Unauthorized,
    /// See [`SyncError::NotFound`]
    NotFound,
    /// See [`SyncError::Network`]
    Network,
    /// See [`SyncError::Validation`]
    Validation,
    /// See [`SyncError::Conflict`]
    Conflict,
    /// See [`SyncError::InvalidTransition`]
    InvalidTransition,
    /// See [`SyncError::ServerError`]
    ServerError,
    /// See [`SyncError::Unknown`]
    Unknown,
}

impl SyncError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Unauthorized(_) => ErrorKind::Unauthorized,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::Validation { .. } => ErrorKind::Validation,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            SyncError::ServerError(_) => ErrorKind::ServerError,
            SyncError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Check whether an explicit retry could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::ServerError(_))
    }

    /// Field errors, when present
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            SyncError::Validation { field_errors, .. } => field_errors,
            _ => &[],
        }
    }

    /// Shorthand for a network error
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Network(message.into())
    }

    /// Shorthand for a validation error without field detail
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation {
            message: message.into(),
            field_errors: Vec::new(),
        }
    }
}
