//! Drains the operation queue against registered entity handlers.
//!
//! Draining is strictly sequential: at most one operation is `processing`
//! system-wide, so operations on the same entity reach the server in the
//! order they were queued.
//!
//! Two retry levels are kept apart:
//! - attempt-level backoff: up to `attempts_per_cycle` tries inside one
//!   drain, sleeping `retry_delay * 2^attempt` between them (in memory only);
//! - cycle-level retry: the persisted `retry_count`, consumed once per drain
//!   in which all attempts failed, bounded by `max_retries`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::conflict::{resolve_conflict, ConflictStrategy};
use super::error::SyncError;
use super::network::{ListenerId, NetworkMonitor};
use super::operation::Operation;
use super::queue::OperationQueue;
use super::status::SyncStatus;
use crate::config::SyncConfig;

/// Replays one queued operation against the remote store.
pub trait OperationHandler: Send + Sync {
    fn handle<'a>(&'a self, op: &'a Operation) -> BoxFuture<'a, Result<(), SyncError>>;
}

/// Resolver used by the manual conflict strategy.
pub type ManualResolver =
    Arc<dyn Fn(serde_json::Value, serde_json::Value) -> serde_json::Value + Send + Sync>;

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub synced_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
}

/// Clears the draining flag when a drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    queue: Arc<OperationQueue>,
    network: Arc<NetworkMonitor>,
    config: SyncConfig,
    handlers: RwLock<HashMap<String, Arc<dyn OperationHandler>>>,
    draining: AtomicBool,
    last_synced_at: Mutex<Option<DateTime<Utc>>>,
    status_tx: watch::Sender<SyncStatus>,
    drain_requested: Notify,
    manual_resolver: Option<ManualResolver>,
}

impl SyncCoordinator {
    pub fn new(queue: Arc<OperationQueue>, network: Arc<NetworkMonitor>, config: SyncConfig) -> Self {
        let initial = SyncStatus::derive(&queue.stats(), network.is_online(), false, None);
        let (status_tx, _) = watch::channel(initial);
        Self {
            queue,
            network,
            config,
            handlers: RwLock::new(HashMap::new()),
            draining: AtomicBool::new(false),
            last_synced_at: Mutex::new(None),
            status_tx,
            drain_requested: Notify::new(),
            manual_resolver: None,
        }
    }

    /// Installs the resolver used by [`ConflictStrategy::Manual`].
    pub fn with_manual_resolver(mut self, resolver: ManualResolver) -> Self {
        self.manual_resolver = Some(resolver);
        self
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Routes operations of `entity_type` to `handler`, replacing any
    /// previous registration.
    pub fn register_handler(&self, entity_type: impl Into<String>, handler: Arc<dyn OperationHandler>) {
        let entity_type = entity_type.into();
        tracing::debug!("Registered sync handler for '{}'", entity_type);
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(entity_type, handler);
    }

    fn handler_for(&self, entity_type: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(entity_type)
            .cloned()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_synced_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drains all pending operations once.
    ///
    /// Returns immediately with zero counts when offline or when another
    /// drain is already running. Never fails: per-operation errors are
    /// recorded on the operation and summarized in the result.
    pub async fn process_queue(&self) -> SyncResult {
        let mut result = SyncResult::default();

        if !self.network.is_online() {
            tracing::debug!("Skipping drain while offline");
            self.refresh_status();
            return result;
        }

        let Some(guard) = DrainGuard::acquire(&self.draining) else {
            tracing::debug!("Drain already in progress");
            return result;
        };

        let batch = self.queue.next_batch();
        if batch.is_empty() {
            drop(guard);
            self.refresh_status();
            return result;
        }

        self.refresh_status();
        tracing::info!("Draining {} operation(s)", batch.len());

        let total = batch.len();
        for (index, queued) in batch.into_iter().enumerate() {
            if !self.network.is_online() {
                tracing::warn!(
                    "Network lost mid-drain, leaving {} operation(s) queued",
                    total - index
                );
                break;
            }

            // Re-read: a remap may have rewritten the entity id since the
            // batch was taken, or the operation may have been cancelled.
            let Some(op) = self.queue.mark_processing(queued.id) else {
                continue;
            };

            match self.dispatch(&op).await {
                Ok(()) => {
                    self.queue.mark_completed(op.id);
                    result.synced_count += 1;
                    tracing::debug!("Synced {}", op);
                }
                Err(SyncError::Deferred(reason)) => {
                    tracing::debug!("Deferred {}: {}", op, reason);
                    self.queue.release(op.id);
                }
                Err(
                    e @ (SyncError::Routing(_)
                    | SyncError::Configuration(_)
                    | SyncError::Orphaned(_)),
                ) => {
                    tracing::error!("Giving up on {}: {}", op, e);
                    self.queue.mark_exhausted(op.id, &e.to_string());
                    result.failed_count += 1;
                    result.errors.push(format!("{}: {}", op.id, e));
                }
                Err(e) => {
                    if let Some(status) = self.queue.mark_failed(op.id, &e.to_string()) {
                        tracing::warn!("{} failed this cycle, now {}", op, status);
                    }
                    result.failed_count += 1;
                    result.errors.push(format!("{}: {}", op.id, e));
                }
            }
        }

        self.queue.prune_completed();
        if result.synced_count > 0 {
            *self
                .last_synced_at
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Utc::now());
        }

        drop(guard);
        self.refresh_status();

        tracing::info!(
            "Drain finished: {} synced, {} failed",
            result.synced_count,
            result.failed_count
        );
        result
    }

    /// Runs one operation through its handler with attempt-level backoff.
    async fn dispatch(&self, op: &Operation) -> Result<(), SyncError> {
        let handler = self
            .handler_for(&op.entity_type)
            .ok_or_else(|| SyncError::Routing(op.entity_type.clone()))?;

        let attempts = self.config.attempts_per_cycle.max(1);
        let mut attempt = 0;
        loop {
            let err = match handler.handle(op).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_attempt_retryable() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            match &err {
                SyncError::Fatal(_) => {
                    tracing::error!("Attempt {}/{} for {}: {}", attempt, attempts, op, err)
                }
                _ => tracing::warn!("Attempt {}/{} for {}: {}", attempt, attempts, op, err),
            }

            if attempt >= attempts || !self.network.is_online() {
                return Err(err);
            }
            tokio::time::sleep(self.config.backoff(attempt - 1)).await;
        }
    }

    /// Drains now, independent of the periodic timer.
    pub async fn sync_now(&self) -> SyncResult {
        self.process_queue().await
    }

    /// Asks the background loop started by [`SyncCoordinator::start`] to
    /// drain. Safe to call from synchronous code such as network listeners.
    pub fn request_sync(&self) {
        self.drain_requested.notify_one();
    }

    /// Gives exhausted operations a new retry budget and requests a drain.
    pub fn retry_failed(&self) -> usize {
        let count = self.queue.retry_exhausted();
        if count > 0 {
            tracing::info!("Requeued {} failed operation(s)", count);
            self.request_sync();
        }
        count
    }

    /// Resolves a conflict with the configured strategy.
    pub fn resolve<T>(
        &self,
        local: T,
        server: T,
        local_updated_at: DateTime<Utc>,
        server_updated_at: DateTime<Utc>,
    ) -> Result<T, SyncError>
    where
        T: Serialize + DeserializeOwned,
    {
        let strategy = self.config.conflict_strategy;
        if strategy != ConflictStrategy::Manual {
            return resolve_conflict(local, server, local_updated_at, server_updated_at, strategy, None);
        }

        let resolver = self.manual_resolver.as_ref().ok_or_else(|| {
            SyncError::Configuration("manual conflict strategy requires a resolver".to_string())
        })?;
        let manual = |l: serde_json::Value, s: serde_json::Value| resolver(l, s);
        let to_value =
            |v: T| serde_json::to_value(v).map_err(|e| SyncError::Configuration(e.to_string()));
        let merged = resolve_conflict(
            to_value(local)?,
            to_value(server)?,
            local_updated_at,
            server_updated_at,
            strategy,
            Some(&manual),
        )?;
        serde_json::from_value(merged).map_err(|e| SyncError::Configuration(e.to_string()))
    }

    /// Current status, recomputed on read.
    pub fn status(&self) -> SyncStatus {
        SyncStatus::derive(
            &self.queue.stats(),
            self.network.is_online(),
            self.is_draining(),
            self.last_synced_at(),
        )
    }

    /// Receives a new value whenever the status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    fn refresh_status(&self) {
        let status = self.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// Starts the background sync loop.
    ///
    /// The loop drains on explicit requests, once per reconnect, and on the
    /// periodic timer while online. While offline it waits on the network
    /// channel and never wakes for the timer. A second task keeps the status
    /// channel current on every queue or network change.
    pub fn start(self: &Arc<Self>) -> SyncLoop {
        let weak = Arc::downgrade(self);
        let listener = self.network.on_reconnect(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.request_sync();
            }
        });

        let status_task = tokio::spawn(self.clone().run_status());
        let drain_task = tokio::spawn(self.clone().run_drains());

        SyncLoop {
            network: self.network.clone(),
            listener,
            tasks: vec![status_task, drain_task],
        }
    }

    async fn run_status(self: Arc<Self>) {
        let mut queue_rx = self.queue.subscribe();
        let mut network_rx = self.network.subscribe();
        loop {
            tokio::select! {
                changed = queue_rx.changed() => if changed.is_err() { break },
                changed = network_rx.changed() => if changed.is_err() { break },
            }
            self.refresh_status();
        }
    }

    async fn run_drains(self: Arc<Self>) {
        let mut network_rx = self.network.subscribe();
        let mut ticker = tokio::time::interval(self.config.sync_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Pick up anything left over from a previous session.
        self.process_queue().await;
        ticker.reset();

        loop {
            if !self.network.is_online() {
                // Requests made while offline stay latched in the Notify and
                // are served together with the reconnect request.
                if network_rx.changed().await.is_err() {
                    break;
                }
                ticker.reset();
                continue;
            }

            if self.config.auto_sync {
                tokio::select! {
                    _ = self.drain_requested.notified() => {}
                    _ = ticker.tick() => {}
                    changed = network_rx.changed() => {
                        if changed.is_err() { break }
                        continue;
                    }
                }
            } else {
                tokio::select! {
                    _ = self.drain_requested.notified() => {}
                    changed = network_rx.changed() => {
                        if changed.is_err() { break }
                        continue;
                    }
                }
            }

            self.process_queue().await;
            ticker.reset();
        }
    }
}

/// Handle to the background tasks started by [`SyncCoordinator::start`].
/// Dropping it stops them.
pub struct SyncLoop {
    network: Arc<NetworkMonitor>,
    listener: ListenerId,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncLoop {
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.network.remove_listener(self.listener);
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;
    use crate::storage::MemoryStore;
    use crate::sync::network::NetworkState;
    use crate::sync::operation::{OperationKind, OperationStatus};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Handler that fails a scripted number of times, then succeeds.
    struct ScriptedHandler {
        failures_left: AtomicUsize,
        error: SyncError,
        calls: AtomicUsize,
        seen: Mutex<Vec<Operation>>,
        network: Option<Arc<NetworkMonitor>>,
    }

    impl ScriptedHandler {
        fn new(failures: usize, error: SyncError) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicUsize::new(failures),
                error,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                network: None,
            })
        }

        fn ok() -> Arc<Self> {
            Self::new(0, SyncError::Retryable(String::new()))
        }

        /// Succeeds, then takes the network down.
        fn dropping_network(network: Arc<NetworkMonitor>) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicUsize::new(0),
                error: SyncError::Retryable(String::new()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                network: Some(network),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OperationHandler for ScriptedHandler {
        fn handle<'a>(&'a self, op: &'a Operation) -> BoxFuture<'a, Result<(), SyncError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.seen.lock().unwrap().push(op.clone());
                if let Some(network) = &self.network {
                    network.apply(NetworkState::offline());
                }
                let left = self.failures_left.load(Ordering::SeqCst);
                if left > 0 {
                    self.failures_left.store(left - 1, Ordering::SeqCst);
                    return Err(self.error.clone());
                }
                Ok(())
            })
        }
    }

    fn test_config() -> SyncConfig {
        SyncConfig {
            max_retries: 2,
            attempts_per_cycle: 3,
            retry_delay_ms: 1,
            sync_interval_ms: 60_000,
            ..SyncConfig::default()
        }
    }

    fn setup() -> (Arc<SyncCoordinator>, Arc<OperationQueue>, Arc<NetworkMonitor>) {
        let config = test_config();
        let queue = Arc::new(OperationQueue::new(Arc::new(MemoryStore::new()), &config));
        let network = Arc::new(NetworkMonitor::with_state(NetworkState::online()));
        let coordinator = Arc::new(SyncCoordinator::new(queue.clone(), network.clone(), config));
        (coordinator, queue, network)
    }

    fn enqueue(queue: &OperationQueue, entity_type: &str, id: &str) -> Operation {
        queue.enqueue(
            OperationKind::Update,
            entity_type,
            EntityId::persisted(id),
            serde_json::json!({}),
            None,
        )
    }

    #[tokio::test]
    async fn test_drains_in_order_and_removes_completed() {
        let (coordinator, queue, _) = setup();
        let handler = ScriptedHandler::ok();
        coordinator.register_handler("item", handler.clone());

        let first = enqueue(&queue, "item", "a");
        let second = enqueue(&queue, "item", "b");

        let result = coordinator.process_queue().await;
        assert_eq!(result.synced_count, 2);
        assert_eq!(result.failed_count, 0);
        assert_eq!(queue.stats().total, 0);

        let seen: Vec<_> = handler.seen.lock().unwrap().iter().map(|op| op.id).collect();
        assert_eq!(seen, vec![first.id, second.id]);
        assert!(handler
            .seen
            .lock()
            .unwrap()
            .iter()
            .all(|op| op.status == OperationStatus::Processing));
        assert!(coordinator.last_synced_at().is_some());
    }

    #[tokio::test]
    async fn test_completed_operation_is_not_replayed() {
        let (coordinator, queue, _) = setup();
        let handler = ScriptedHandler::ok();
        coordinator.register_handler("item", handler.clone());
        let op = enqueue(&queue, "item", "a");

        coordinator.process_queue().await;
        let again = coordinator.process_queue().await;

        assert_eq!(again, SyncResult::default());
        assert_eq!(handler.calls(), 1);
        assert!(queue.mark_processing(op.id).is_none());
    }

    #[tokio::test]
    async fn test_offline_drain_is_a_no_op() {
        let (coordinator, queue, network) = setup();
        let handler = ScriptedHandler::ok();
        coordinator.register_handler("item", handler.clone());
        enqueue(&queue, "item", "a");

        network.apply(NetworkState::offline());
        let result = coordinator.process_queue().await;

        assert_eq!(result, SyncResult::default());
        assert_eq!(handler.calls(), 0);
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_cycle() {
        let (coordinator, queue, _) = setup();
        let handler = ScriptedHandler::new(2, SyncError::Retryable("timeout".into()));
        coordinator.register_handler("item", handler.clone());
        enqueue(&queue, "item", "a");

        let result = coordinator.process_queue().await;
        assert_eq!(result.synced_count, 1);
        assert_eq!(handler.calls(), 3);
        assert_eq!(queue.stats().total, 0);
    }

    #[tokio::test]
    async fn test_cycle_level_retry_until_exhausted() {
        let (coordinator, queue, _) = setup();
        let handler = ScriptedHandler::new(usize::MAX, SyncError::Fatal("invalid".into()));
        coordinator.register_handler("item", handler.clone());
        let op = enqueue(&queue, "item", "a");

        let first = coordinator.process_queue().await;
        assert_eq!(first.failed_count, 1);
        assert_eq!(handler.calls(), 3);
        let stored = queue.get(op.id).unwrap();
        assert_eq!(stored.status, OperationStatus::Pending);
        assert_eq!(stored.retry_count, 1);

        coordinator.process_queue().await;
        assert_eq!(handler.calls(), 6);
        assert!(queue.get(op.id).unwrap().is_exhausted());

        // exhausted operations are not retried automatically
        let third = coordinator.process_queue().await;
        assert_eq!(third, SyncResult::default());
        assert_eq!(handler.calls(), 6);
        assert_eq!(coordinator.status().failed_count, 1);
    }

    #[tokio::test]
    async fn test_unregistered_entity_type_fails_fast() {
        let (coordinator, queue, _) = setup();
        let op = enqueue(&queue, "scarf", "a");

        let result = coordinator.process_queue().await;
        assert_eq!(result.failed_count, 1);
        assert!(result.errors[0].contains("scarf"));
        assert!(queue.get(op.id).unwrap().is_exhausted());
    }

    #[tokio::test]
    async fn test_deferred_operation_keeps_budget() {
        let (coordinator, queue, _) = setup();
        let handler = ScriptedHandler::new(1, SyncError::Deferred("temporary id".into()));
        coordinator.register_handler("item", handler.clone());
        let op = enqueue(&queue, "item", "a");

        let result = coordinator.process_queue().await;
        assert_eq!(result, SyncResult::default());
        let stored = queue.get(op.id).unwrap();
        assert_eq!(stored.status, OperationStatus::Pending);
        assert_eq!(stored.retry_count, 0);

        coordinator.process_queue().await;
        assert!(queue.get(op.id).is_none());
    }

    #[tokio::test]
    async fn test_network_drop_aborts_remaining_batch() {
        let (coordinator, queue, network) = setup();
        let handler = ScriptedHandler::dropping_network(network.clone());
        coordinator.register_handler("item", handler.clone());
        enqueue(&queue, "item", "a");
        enqueue(&queue, "item", "b");

        let result = coordinator.process_queue().await;
        assert_eq!(result.synced_count, 1);
        assert_eq!(handler.calls(), 1);
        assert_eq!(queue.stats().pending, 1);
    }

    #[tokio::test]
    async fn test_concurrent_drain_is_a_no_op() {
        let (coordinator, queue, _) = setup();
        coordinator.register_handler("item", ScriptedHandler::ok());
        enqueue(&queue, "item", "a");

        let guard = DrainGuard::acquire(&coordinator.draining).unwrap();
        assert_eq!(coordinator.process_queue().await, SyncResult::default());
        assert_eq!(coordinator.status().state, crate::sync::SyncState::Syncing);
        drop(guard);

        assert_eq!(coordinator.process_queue().await.synced_count, 1);
    }

    #[tokio::test]
    async fn test_retry_failed_requeues() {
        let (coordinator, queue, _) = setup();
        let op = enqueue(&queue, "scarf", "a");
        coordinator.process_queue().await;
        assert!(queue.get(op.id).unwrap().is_exhausted());

        coordinator.register_handler("scarf", ScriptedHandler::ok());
        assert_eq!(coordinator.retry_failed(), 1);
        assert_eq!(coordinator.sync_now().await.synced_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_uses_configured_strategy() {
        let (coordinator, _, _) = setup();
        let now = Utc::now();
        let later = now + chrono::Duration::seconds(1);
        assert_eq!(coordinator.resolve("l".to_string(), "s".to_string(), later, now).unwrap(), "l");

        let config = SyncConfig {
            conflict_strategy: ConflictStrategy::Manual,
            ..test_config()
        };
        let queue = Arc::new(OperationQueue::new(Arc::new(MemoryStore::new()), &config));
        let network = Arc::new(NetworkMonitor::new());
        let manual = SyncCoordinator::new(queue.clone(), network.clone(), config.clone());
        assert!(matches!(
            manual.resolve(1, 2, now, later),
            Err(SyncError::Configuration(_))
        ));

        let manual = SyncCoordinator::new(queue, network, config)
            .with_manual_resolver(Arc::new(|local, _server| local));
        assert_eq!(manual.resolve(1, 2, now, later).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_background_loop_drains_once_per_reconnect() {
        let config = SyncConfig {
            auto_sync: false,
            ..test_config()
        };
        let queue = Arc::new(OperationQueue::new(Arc::new(MemoryStore::new()), &config));
        let network = Arc::new(NetworkMonitor::with_state(NetworkState::offline()));
        let coordinator = Arc::new(SyncCoordinator::new(queue.clone(), network.clone(), config));
        let handler = ScriptedHandler::ok();
        coordinator.register_handler("item", handler.clone());
        let sync_loop = coordinator.start();

        enqueue(&queue, "item", "a");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handler.calls(), 0);

        // rapid flapping: offline -> online -> online -> offline -> online
        network.apply(NetworkState::online());
        network.apply(NetworkState::unknown());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls(), 1);
        assert_eq!(queue.stats().total, 0);

        let mut status_rx = coordinator.subscribe_status();
        network.apply(NetworkState::offline());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(status_rx.borrow_and_update().state, crate::sync::SyncState::Offline);

        enqueue(&queue, "item", "b");
        network.apply(NetworkState::online());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls(), 2);

        sync_loop.shutdown();
    }
}
