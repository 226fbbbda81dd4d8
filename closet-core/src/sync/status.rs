use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::queue::QueueStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
    Offline,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Error => write!(f, "error"),
            SyncState::Offline => write!(f, "offline"),
        }
    }
}

/// Read-only summary of sync health, derived from the queue and network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending_count: usize,
    pub failed_count: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_online: bool,
}

impl SyncStatus {
    /// Offline beats everything, then an active drain, then permanent
    /// failures.
    pub fn derive(
        stats: &QueueStats,
        is_online: bool,
        draining: bool,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Self {
        let state = if !is_online {
            SyncState::Offline
        } else if draining {
            SyncState::Syncing
        } else if stats.failed > 0 {
            SyncState::Error
        } else {
            SyncState::Idle
        };

        Self {
            state,
            pending_count: stats.pending + stats.processing,
            failed_count: stats.failed,
            last_synced_at,
            is_online,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} pending, {} failed)",
            self.state, self.pending_count, self.failed_count
        )?;
        match self.last_synced_at {
            Some(at) => write!(f, ", last synced {}", at.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, ", never synced"),
        }
    }
}
