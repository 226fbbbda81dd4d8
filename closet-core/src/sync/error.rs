//! Sync error types.

use thiserror::Error;

/// Errors produced while replaying operations against the entity API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No handler is registered for the operation's entity type. Never retried.
    #[error("No handler registered for entity type '{0}'")]
    Routing(String),

    /// Transient failure (network, timeout, server overload).
    #[error("Retryable error: {0}")]
    Retryable(String),

    /// Permanent failure (validation, permission). Still goes through the
    /// retry budget but is logged as an error.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// The operation cannot run yet, e.g. its entity still has a temporary
    /// id. Returned to the queue without consuming retry budget.
    #[error("Deferred: {0}")]
    Deferred(String),

    /// The operation targets an entity that can never get a server id,
    /// because its create is no longer queued. Never retried.
    #[error("Orphaned operation: {0}")]
    Orphaned(String),

    /// The engine is misconfigured for the requested action.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Whether another attempt inside the same drain is worthwhile.
    pub fn is_attempt_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable(_) | SyncError::Fatal(_))
    }
}
