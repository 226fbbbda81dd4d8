//! Conflict resolution between a local and a server version of an entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    LocalWins,
    ServerWins,
    /// Newer `updated_at` wins; ties go to the server.
    #[default]
    LastWriteWins,
    /// Delegates to an explicit resolver. Having none is a configuration
    /// error rather than a silent fallback.
    Manual,
}

/// Picks the winning version of a conflicting entity.
pub fn resolve_conflict<T>(
    local: T,
    server: T,
    local_updated_at: DateTime<Utc>,
    server_updated_at: DateTime<Utc>,
    strategy: ConflictStrategy,
    resolver: Option<&dyn Fn(T, T) -> T>,
) -> Result<T, SyncError> {
    match strategy {
        ConflictStrategy::LocalWins => Ok(local),
        ConflictStrategy::ServerWins => Ok(server),
        ConflictStrategy::LastWriteWins => {
            if local_updated_at > server_updated_at {
                Ok(local)
            } else {
                Ok(server)
            }
        }
        ConflictStrategy::Manual => match resolver {
            Some(resolve) => Ok(resolve(local, server)),
            None => {
                tracing::warn!("Manual conflict strategy configured without a resolver");
                Err(SyncError::Configuration(
                    "manual conflict strategy requires a resolver".to_string(),
                ))
            }
        },
    }
}
