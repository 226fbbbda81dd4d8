//! Durable, bounded queue of pending mutations.
//!
//! The queue is the single source of truth for outstanding work and the only
//! writer of operation status and retry counters. Every mutation is persisted
//! as a JSON array under [`QUEUE_KEY`]; persistence failures are logged and
//! the in-memory queue stays authoritative for the rest of the session.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;

use super::operation::{Operation, OperationId, OperationKind, OperationStatus};
use crate::config::SyncConfig;
use crate::models::EntityId;
use crate::storage::KvStore;

/// Storage key of the serialized queue.
pub const QUEUE_KEY: &str = "sync_queue";

/// Counts of operations per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
    pub completed: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    operations: Vec<Operation>,
    next_sequence: u64,
}

impl QueueState {
    fn find_mut(&mut self, id: OperationId) -> Option<&mut Operation> {
        self.operations.iter_mut().find(|op| op.id == id)
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.operations.len(),
            ..QueueStats::default()
        };
        for op in &self.operations {
            match op.status {
                OperationStatus::Pending => stats.pending += 1,
                OperationStatus::Processing => stats.processing += 1,
                OperationStatus::Failed => stats.failed += 1,
                OperationStatus::Completed => stats.completed += 1,
            }
        }
        stats
    }

    /// Picks the next eviction victim: completed first, then exhausted
    /// failures, then the oldest pending operation. In-flight work is never
    /// evicted.
    fn eviction_candidate(&self) -> Option<usize> {
        let oldest = |pred: &dyn Fn(&Operation) -> bool| {
            self.operations
                .iter()
                .enumerate()
                .filter(|(_, op)| pred(op))
                .min_by_key(|(_, op)| op.sequence)
                .map(|(idx, _)| idx)
        };

        oldest(&|op: &Operation| op.status == OperationStatus::Completed)
            .or_else(|| oldest(&|op: &Operation| op.is_exhausted()))
            .or_else(|| oldest(&|op: &Operation| op.status == OperationStatus::Pending))
    }

    /// Whether `op` has to wait for other work on the same entity: an
    /// in-flight operation, or a pending one enqueued before it.
    fn blocked(&self, op: &Operation) -> bool {
        self.operations.iter().any(|other| {
            other.id != op.id
                && other.entity_id == op.entity_id
                && match other.status {
                    OperationStatus::Processing => true,
                    OperationStatus::Pending => other.sequence < op.sequence,
                    _ => false,
                }
        })
    }

    /// Removes the operation at `idx`. Evicting the unfinished create of an
    /// entity that only has a temporary id also drops the rest of that
    /// entity's queued work, which could never run without it.
    fn evict(&mut self, idx: usize) -> Vec<Operation> {
        let evicted = self.operations.remove(idx);
        let mut dropped = Vec::new();
        if evicted.kind == OperationKind::Create
            && evicted.status != OperationStatus::Completed
            && evicted.entity_id.is_temporary()
        {
            let (orphans, kept): (Vec<Operation>, Vec<Operation>) = std::mem::take(&mut self.operations)
                .into_iter()
                .partition(|op| {
                    op.entity_id == evicted.entity_id && op.status != OperationStatus::Processing
                });
            self.operations = kept;
            dropped = orphans;
        }
        dropped.insert(0, evicted);
        dropped
    }
}

/// The operation queue.
pub struct OperationQueue {
    state: Mutex<QueueState>,
    store: Arc<dyn KvStore>,
    max_queue_size: usize,
    max_retries: u32,
    stats_tx: watch::Sender<QueueStats>,
}

impl OperationQueue {
    /// Creates an empty queue backed by `store`. Existing persisted state is
    /// ignored; use [`OperationQueue::load`] to restore it.
    pub fn new(store: Arc<dyn KvStore>, config: &SyncConfig) -> Self {
        let (stats_tx, _) = watch::channel(QueueStats::default());
        Self {
            state: Mutex::new(QueueState {
                operations: Vec::new(),
                next_sequence: 1,
            }),
            store,
            max_queue_size: config.max_queue_size.max(1),
            max_retries: config.max_retries,
            stats_tx,
        }
    }

    /// Restores the queue from `store`.
    ///
    /// Malformed entries are dropped individually. Operations left in
    /// `processing` by an interrupted process go back to `pending`.
    pub fn load(store: Arc<dyn KvStore>, config: &SyncConfig) -> Self {
        let queue = Self::new(store, config);
        let operations = queue.read_persisted();

        {
            let mut state = queue.lock();
            state.next_sequence = operations.iter().map(|op| op.sequence).max().unwrap_or(0) + 1;
            state.operations = operations;
            queue.stats_tx.send_replace(state.stats());
        }

        let stats = queue.stats();
        if stats.total > 0 {
            tracing::info!(
                "Restored sync queue: {} pending, {} failed",
                stats.pending,
                stats.failed
            );
        }
        queue
    }

    fn read_persisted(&self) -> Vec<Operation> {
        let contents = match self.store.get(QUEUE_KEY) {
            Ok(Some(contents)) => contents,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read sync queue, starting empty: {}", e);
                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Discarding unreadable sync queue: {}", e);
                return Vec::new();
            }
        };

        let mut dropped = 0;
        let operations = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Operation>(entry) {
                Ok(mut op) => {
                    if op.status == OperationStatus::Processing {
                        op.status = OperationStatus::Pending;
                    }
                    Some(op)
                }
                Err(_) => {
                    dropped += 1;
                    None
                }
            })
            .collect();

        if dropped > 0 {
            tracing::warn!("Dropped {} malformed sync queue entr(ies)", dropped);
        }
        operations
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` under the queue lock. When `f` reports a change the queue is
    /// persisted and new stats are published before the lock is released, so
    /// writes reach the store in mutation order.
    fn mutate<R>(&self, f: impl FnOnce(&mut QueueState) -> (R, bool)) -> R {
        let mut state = self.lock();
        let (result, changed) = f(&mut state);
        if changed {
            self.persist(&state.operations);
            self.stats_tx.send_replace(state.stats());
        }
        result
    }

    fn persist(&self, operations: &[Operation]) {
        let json = match serde_json::to_string(operations) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize sync queue: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(QUEUE_KEY, &json) {
            tracing::error!("Failed to persist sync queue: {}", e);
        }
    }

    /// Appends a new pending operation, evicting old work first if the queue
    /// is full.
    pub fn enqueue(
        &self,
        kind: OperationKind,
        entity_type: &str,
        entity_id: EntityId,
        payload: serde_json::Value,
        priority: Option<i32>,
    ) -> Operation {
        let max_queue_size = self.max_queue_size;
        let max_retries = self.max_retries;

        self.mutate(|state| {
            while state.operations.len() >= max_queue_size {
                let Some(idx) = state.eviction_candidate() else {
                    break;
                };
                for evicted in state.evict(idx) {
                    if evicted.status == OperationStatus::Pending {
                        tracing::warn!("Sync queue full, evicted pending operation: {}", evicted);
                    } else {
                        tracing::debug!("Sync queue full, evicted {}", evicted);
                    }
                }
            }

            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let op = Operation::new(kind, entity_type, entity_id, payload, sequence, max_retries)
                .with_priority(priority.unwrap_or(0));
            tracing::debug!("Enqueued {}", op);
            state.operations.push(op.clone());
            (op, true)
        })
    }

    /// Pending operations in drain order: priority descending, then FIFO.
    pub fn next_batch(&self) -> Vec<Operation> {
        let state = self.lock();
        let mut batch: Vec<Operation> = state
            .operations
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .cloned()
            .collect();
        batch.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        batch
    }

    /// Moves a pending operation to `processing` and returns its current
    /// state. Returns `None` if the operation is gone, not pending, or still
    /// waiting behind earlier work on the same entity.
    pub fn mark_processing(&self, id: OperationId) -> Option<Operation> {
        self.mutate(|state| {
            let Some(idx) = state.operations.iter().position(|op| op.id == id) else {
                return (None, false);
            };
            let op = &state.operations[idx];
            if op.status != OperationStatus::Pending || state.blocked(op) {
                return (None, false);
            }
            let op = &mut state.operations[idx];
            op.status = OperationStatus::Processing;
            (Some(op.clone()), true)
        })
    }

    pub fn mark_completed(&self, id: OperationId) -> bool {
        self.mutate(|state| match state.find_mut(id) {
            Some(op) if op.status == OperationStatus::Processing => {
                op.status = OperationStatus::Completed;
                op.last_error = None;
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Records a failed cycle. The operation returns to `pending` while
    /// retry budget remains and stays `failed` once exhausted. Returns the
    /// resulting status.
    pub fn mark_failed(&self, id: OperationId, error: &str) -> Option<OperationStatus> {
        self.mutate(|state| match state.find_mut(id) {
            Some(op) if op.status == OperationStatus::Processing => {
                op.retry_count += 1;
                op.last_error = Some(error.to_string());
                op.status = if op.retry_count >= op.max_retries {
                    OperationStatus::Failed
                } else {
                    OperationStatus::Pending
                };
                (Some(op.status), true)
            }
            _ => (None, false),
        })
    }

    /// Fails an operation terminally regardless of remaining budget.
    pub fn mark_exhausted(&self, id: OperationId, error: &str) -> bool {
        self.mutate(|state| match state.find_mut(id) {
            Some(op) if op.status != OperationStatus::Completed => {
                op.status = OperationStatus::Failed;
                op.retry_count = op.retry_count.max(op.max_retries);
                op.last_error = Some(error.to_string());
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Returns a processing operation to `pending` without consuming budget.
    pub fn release(&self, id: OperationId) -> bool {
        self.mutate(|state| match state.find_mut(id) {
            Some(op) if op.status == OperationStatus::Processing => {
                op.status = OperationStatus::Pending;
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Cancels all queued work for an entity. Returns the number removed.
    /// In-flight operations are left alone.
    pub fn remove_by_entity(&self, entity_id: &EntityId) -> usize {
        self.mutate(|state| {
            let before = state.operations.len();
            state.operations.retain(|op| {
                &op.entity_id != entity_id || op.status == OperationStatus::Processing
            });
            let removed = before - state.operations.len();
            (removed, removed > 0)
        })
    }

    /// Rewrites every unfinished operation that targets or references
    /// `old_id` so that it uses `new_id`. Returns the number of operations
    /// touched.
    pub fn remap_entity_id(&self, old_id: &EntityId, new_id: &EntityId) -> usize {
        let (Ok(old_value), Ok(new_value)) =
            (serde_json::to_value(old_id), serde_json::to_value(new_id))
        else {
            return 0;
        };

        self.mutate(|state| {
            let mut touched = 0;
            for op in state
                .operations
                .iter_mut()
                .filter(|op| op.status != OperationStatus::Completed)
            {
                let mut changed = false;
                if &op.entity_id == old_id {
                    op.entity_id = new_id.clone();
                    changed = true;
                }
                if replace_value(&mut op.payload, &old_value, &new_value) {
                    changed = true;
                }
                if changed {
                    touched += 1;
                }
            }
            if touched > 0 {
                tracing::debug!("Remapped {} operation(s) from {} to {}", touched, old_id, new_id);
            }
            (touched, touched > 0)
        })
    }

    /// Drops completed operations. Returns the number removed.
    pub fn prune_completed(&self) -> usize {
        self.mutate(|state| {
            let before = state.operations.len();
            state
                .operations
                .retain(|op| op.status != OperationStatus::Completed);
            let removed = before - state.operations.len();
            (removed, removed > 0)
        })
    }

    /// Gives exhausted operations a fresh retry budget. Returns the number
    /// of operations requeued.
    pub fn retry_exhausted(&self) -> usize {
        self.mutate(|state| {
            let mut count = 0;
            for op in state.operations.iter_mut().filter(|op| op.is_exhausted()) {
                op.status = OperationStatus::Pending;
                op.retry_count = 0;
                count += 1;
            }
            (count, count > 0)
        })
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.mutate(|state| {
            let changed = !state.operations.is_empty();
            state.operations.clear();
            ((), changed)
        })
    }

    pub fn get(&self, id: OperationId) -> Option<Operation> {
        self.lock().operations.iter().find(|op| op.id == id).cloned()
    }

    /// Snapshot of all operations in insertion order.
    pub fn list(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Whether any unfinished operation targets `entity_id`.
    pub fn has_work_for(&self, entity_id: &EntityId) -> bool {
        self.lock()
            .operations
            .iter()
            .any(|op| &op.entity_id == entity_id && op.status != OperationStatus::Completed)
    }

    /// Whether an unfinished create for `entity_id` is still queued.
    pub fn has_create_for(&self, entity_id: &EntityId) -> bool {
        self.lock().operations.iter().any(|op| {
            op.kind == OperationKind::Create
                && &op.entity_id == entity_id
                && op.status != OperationStatus::Completed
        })
    }

    /// Like [`OperationQueue::has_work_for`], ignoring operation `except`.
    pub fn has_other_work_for(&self, entity_id: &EntityId, except: OperationId) -> bool {
        self.lock().operations.iter().any(|op| {
            op.id != except && &op.entity_id == entity_id && op.status != OperationStatus::Completed
        })
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats()
    }

    /// Receives new stats after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<QueueStats> {
        self.stats_tx.subscribe()
    }
}

/// Replaces every occurrence of `old` inside `value` with `new`.
fn replace_value(value: &mut serde_json::Value, old: &serde_json::Value, new: &serde_json::Value) -> bool {
    if value == old {
        *value = new.clone();
        return true;
    }
    match value {
        serde_json::Value::Array(items) => items
            .iter_mut()
            .fold(false, |acc, item| replace_value(item, old, new) || acc),
        serde_json::Value::Object(map) => map
            .values_mut()
            .fold(false, |acc, item| replace_value(item, old, new) || acc),
        _ => false,
    }
}
