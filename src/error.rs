//! Error types for the routelayer controller
//!
//! Errors carry the kind and name of the record they concern so a failed
//! reconciliation can be traced back to a specific Layer or LayerService.
//! Nothing here is fatal: every variant is either retried by the work queue
//! or requires a spec change.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for routelayer operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Optimistic concurrency failure: the record changed since it was read
    #[error("conflict writing {kind} {name}: record was modified since it was read")]
    Conflict {
        /// Resource kind (Layer, LayerService)
        kind: String,
        /// Identity of the record
        name: String,
    },

    /// The record targeted by a write no longer exists
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (Layer, LayerService)
        kind: String,
        /// Identity of the record
        name: String,
    },

    /// Deletion cleanup failed; the finalizer stays in place
    #[error("cleanup of {kind} {name} failed: {message}")]
    Cleanup {
        /// Resource kind (Layer, LayerService)
        kind: String,
        /// Identity of the record
        name: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid record that cannot be reconciled until its spec changes
    #[error("validation error for {name}: {message}")]
    Validation {
        /// Identity of the record
        name: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "store", "runner")
        context: String,
    },
}

impl Error {
    /// Create a conflict error for a record
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a not-found error for a record
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a cleanup error for a record being deleted
    pub fn cleanup(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Cleanup {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error without record context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            name: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error for a named record
    pub fn validation_for(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors need a spec or code fix. Everything
    /// else (store conflicts, connectivity, cleanup) goes back to the queue.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { .. } => true,
            Error::Conflict { .. } => true,
            Error::NotFound { .. } => true,
            Error::Cleanup { .. } => true,
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Whether this is an optimistic concurrency failure
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 409,
            _ => false,
        }
    }
}
