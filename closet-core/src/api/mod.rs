//! Remote entity store.
//!
//! [`EntityApi`] is the per-entity-type seam between the sync engine and the
//! server. [`HttpEntityApi`] talks JSON over HTTP; tests substitute in-memory
//! fakes.

mod http;
#[cfg(test)]
pub(crate) mod memory;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::SyncEntity;
use crate::sync::SyncError;

pub use http::{ApiClient, HttpEntityApi, HttpProbe};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network failure, timeout or an overloaded server.
    #[error("{0}")]
    Retryable(String),

    /// The server rejected the request.
    #[error("{0}")]
    Fatal(String),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Retryable(msg) => SyncError::Retryable(msg),
            ApiError::Fatal(msg) => SyncError::Fatal(msg),
        }
    }
}

/// CRUD operations on one remote collection.
pub trait EntityApi<E: SyncEntity>: Send + Sync {
    fn create<'a>(&'a self, input: &'a E::Input) -> BoxFuture<'a, Result<E, ApiError>>;

    fn update<'a>(
        &'a self,
        id: &'a str,
        changes: &'a E::Changes,
    ) -> BoxFuture<'a, Result<E, ApiError>>;

    /// Deleting an entity the server no longer has succeeds.
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>>;

    fn list<'a>(&'a self, owner_id: &'a str) -> BoxFuture<'a, Result<Vec<E>, ApiError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_into_sync_error() {
        assert_eq!(
            SyncError::from(ApiError::Retryable("timeout".into())),
            SyncError::Retryable("timeout".into())
        );
        assert_eq!(
            SyncError::from(ApiError::Fatal("bad request".into())),
            SyncError::Fatal("bad request".into())
        );
    }
}
