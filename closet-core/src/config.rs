//! Tuning knobs for the sync engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sync::ConflictStrategy;

/// Sync engine configuration.
///
/// Every field has a default, so a partial `sync:` section in a config file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on stored operations before eviction kicks in.
    pub max_queue_size: usize,
    /// Cycle-level retry budget per operation, counted across drains.
    pub max_retries: u32,
    /// Attempt-level retries inside a single drain.
    pub attempts_per_cycle: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_delay_ms: u64,
    /// Period of the auto-sync timer.
    pub sync_interval_ms: u64,
    /// Drain periodically while online.
    pub auto_sync: bool,
    pub conflict_strategy: ConflictStrategy,
    /// Capacity of each service's background sync channel.
    pub background_capacity: usize,
    /// Request timeout for the HTTP entity API and connectivity probe.
    pub request_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            max_retries: 3,
            attempts_per_cycle: 3,
            retry_delay_ms: 1000,
            sync_interval_ms: 30_000,
            auto_sync: true,
            conflict_strategy: ConflictStrategy::LastWriteWins,
            background_capacity: 32,
            request_timeout_ms: 10_000,
        }
    }
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backoff before the attempt following `attempt` (zero-based):
    /// `retry_delay * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}
