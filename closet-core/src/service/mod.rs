//! Optimistic entity services.
//!
//! Every mutation lands in local state immediately and returns without
//! touching the network. Its remote counterpart is recorded in the durable
//! operation queue right away, so it keeps its place behind earlier edits.
//! When online, a background worker fed by a bounded channel replays that
//! operation at once; otherwise it waits for the next drain.
//!
//! The service is the only writer of its entities' local state. The sync
//! coordinator reaches it through [`OptimisticService::handler`].

mod local;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::api::EntityApi;
use crate::models::{EntityId, Item, Outfit, SyncEntity};
use crate::sync::{
    NetworkMonitor, Operation, OperationHandler, OperationId, OperationKind, OperationQueue,
    SyncError,
};

pub use local::LocalStore;

pub type ItemService = OptimisticService<Item>;
pub type OutfitService = OptimisticService<Outfit>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Entity not found: {0}")]
    NotFound(EntityId),
}

/// How a mutation reached (or did not need to reach) the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Applied remotely by the background worker.
    Synced,
    /// Recorded in the operation queue for a later drain.
    Queued,
    /// Nothing to send, e.g. deleting an entity the server never saw or
    /// listing while offline.
    LocalOnly,
    /// A background refresh failed. Mutations never end up here.
    Failed(SyncError),
}

/// Completion handle for the remote side of a mutation. Callers may await it
/// but never have to.
pub struct SyncTicket(TicketState);

enum TicketState {
    Ready(SyncOutcome),
    Pending(oneshot::Receiver<SyncOutcome>),
}

impl SyncTicket {
    fn ready(outcome: SyncOutcome) -> Self {
        SyncTicket(TicketState::Ready(outcome))
    }

    /// Resolves once the background work for this mutation is done.
    pub async fn settled(self) -> SyncOutcome {
        match self.0 {
            TicketState::Ready(outcome) => outcome,
            // the worker only drops a job without answering on shutdown
            TicketState::Pending(rx) => rx.await.unwrap_or(SyncOutcome::LocalOnly),
        }
    }
}

/// The locally applied result of a mutation plus its sync ticket.
pub struct Mutation<T> {
    pub value: T,
    pub ticket: SyncTicket,
}

enum JobKind {
    /// Runs a queued operation now instead of waiting for the next drain.
    Replay { op_id: OperationId },
    Refresh { owner_id: String },
}

impl JobKind {
    /// Outcome reported when the worker never sees the job.
    fn skipped(&self) -> SyncOutcome {
        match self {
            JobKind::Replay { .. } => SyncOutcome::Queued,
            JobKind::Refresh { .. } => SyncOutcome::LocalOnly,
        }
    }
}

struct Job {
    kind: JobKind,
    done: oneshot::Sender<SyncOutcome>,
}

fn payload<T: Serialize>(value: &T) -> Result<serde_json::Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::Fatal(format!("Unserializable payload: {}", e)))
}

fn malformed(op: &Operation, e: serde_json::Error) -> SyncError {
    SyncError::Fatal(format!("Malformed {} payload: {}", op.kind, e))
}

/// State shared by the service handle, its background worker and its queue
/// handler.
struct Shared<E: SyncEntity> {
    api: Arc<dyn EntityApi<E>>,
    local: LocalStore<E>,
    queue: Arc<OperationQueue>,
    network: Arc<NetworkMonitor>,
}

impl<E: SyncEntity> Shared<E> {
    /// Swaps the temporary entity for its server copy and remaps queued work
    /// in one step under the local-state lock. If the entity was deleted
    /// locally in the meantime, queues a delete for the new server id.
    fn reconcile_created(&self, temp_id: &EntityId, server: E, op_id: OperationId) {
        let new_id = server.id().clone();
        let found = self.local.mutate(|entities| {
            match entities.iter().position(|e| e.id() == temp_id) {
                Some(idx) => {
                    // Keep local edits that are still queued; the server copy
                    // only reflects the create.
                    if self.queue.has_other_work_for(temp_id, op_id) {
                        entities[idx].set_id(new_id.clone());
                    } else {
                        entities[idx] = server;
                    }
                    self.queue.remap_entity_id(temp_id, &new_id);
                    (true, true)
                }
                None => (false, false),
            }
        });

        if found {
            tracing::debug!("{} {} is now {}", E::ENTITY_TYPE, temp_id, new_id);
        } else {
            tracing::info!(
                "{} {} was deleted before its create returned, deleting {}",
                E::ENTITY_TYPE,
                temp_id,
                new_id
            );
            self.queue.enqueue(
                OperationKind::Delete,
                E::ENTITY_TYPE,
                new_id,
                serde_json::Value::Null,
                None,
            );
        }
    }

    /// Adopts the server copy unless newer local edits are still queued.
    fn reconcile_updated(&self, server: E, op_id: OperationId) {
        let pending = self.queue.has_other_work_for(server.id(), op_id);
        self.local.mutate(|entities| {
            match entities.iter_mut().find(|e| e.id() == server.id()) {
                Some(entity) if !pending => {
                    *entity = server;
                    ((), true)
                }
                _ => ((), false),
            }
        });
    }

    /// Merges a server listing for `owner_id`, fetched at `fetched_at`, into
    /// local state. Server copies replace local ones, except for temporary
    /// entities, entities with queued work and entities changed after the
    /// fetch started, which are kept as they are.
    fn merge_remote(&self, owner_id: &str, remote: Vec<E>, fetched_at: DateTime<Utc>) {
        self.local.mutate(|entities| {
            let mut merged: Vec<E> = Vec::with_capacity(remote.len());
            for server in remote {
                let queued = self.queue.has_work_for(server.id());
                match entities.iter().find(|e| e.id() == server.id()) {
                    Some(local) if queued || local.updated_at() > fetched_at => {
                        merged.push(local.clone())
                    }
                    Some(_) => merged.push(server),
                    // deleted locally, delete not yet synced
                    None if queued => {}
                    None => merged.push(server),
                }
            }

            for local in entities.iter() {
                if merged.iter().any(|e| e.id() == local.id()) {
                    continue;
                }
                let keep = local.owner_id() != owner_id
                    || local.id().is_temporary()
                    || local.updated_at() > fetched_at
                    || self.queue.has_work_for(local.id());
                if keep {
                    merged.push(local.clone());
                }
            }

            *entities = merged;
            ((), true)
        });
    }

    /// Why an operation on a temporary id cannot run: it waits for its create,
    /// or it never will because that create is gone.
    fn unresolved(&self, op: &Operation) -> SyncError {
        if self.queue.has_create_for(&op.entity_id) {
            SyncError::Deferred(format!("{} has no server id yet", op.entity_id))
        } else {
            SyncError::Orphaned(format!("create for {} is no longer queued", op.entity_id))
        }
    }

    /// Sends one queued operation to the server and reconciles local state
    /// with the response.
    async fn apply(&self, op: &Operation) -> Result<(), SyncError> {
        match op.kind {
            OperationKind::Create => {
                let input: E::Input = op.payload_as().map_err(|e| malformed(op, e))?;
                let server = self.api.create(&input).await?;
                self.reconcile_created(&op.entity_id, server, op.id);
            }
            OperationKind::Update => {
                let remote = op.entity_id.remote().ok_or_else(|| self.unresolved(op))?;
                let changes: E::Changes = op.payload_as().map_err(|e| malformed(op, e))?;
                let server = self.api.update(remote, &changes).await?;
                self.reconcile_updated(server, op.id);
            }
            OperationKind::Delete => {
                let remote = op.entity_id.remote().ok_or_else(|| self.unresolved(op))?;
                self.api.delete(remote).await?;
            }
        }
        Ok(())
    }

    /// Runs a reserved queue operation on the worker. The operation keeps its
    /// place in the queue: if it cannot run yet, or fails, it stays there for
    /// the coordinator.
    async fn replay(&self, op_id: OperationId) -> SyncOutcome {
        if !self.network.is_online() {
            return SyncOutcome::Queued;
        }
        let Some(op) = self.queue.mark_processing(op_id) else {
            return SyncOutcome::Queued;
        };

        match self.apply(&op).await {
            Ok(()) => {
                self.queue.mark_completed(op.id);
                self.queue.prune_completed();
                SyncOutcome::Synced
            }
            Err(e) => {
                tracing::warn!("Inline sync of {} failed, leaving it queued: {}", op, e);
                match &e {
                    SyncError::Deferred(_) | SyncError::Retryable(_) => {
                        self.queue.release(op.id);
                    }
                    SyncError::Fatal(_) => {
                        self.queue.mark_failed(op.id, &e.to_string());
                    }
                    SyncError::Routing(_) | SyncError::Configuration(_) | SyncError::Orphaned(_) => {
                        self.queue.mark_exhausted(op.id, &e.to_string());
                    }
                }
                SyncOutcome::Queued
            }
        }
    }

    async fn refresh(&self, owner_id: &str) -> SyncOutcome {
        let fetched_at = Utc::now();
        match self.api.list(owner_id).await {
            Ok(remote) => {
                tracing::debug!("Fetched {} {} from server", remote.len(), E::COLLECTION);
                self.merge_remote(owner_id, remote, fetched_at);
                SyncOutcome::Synced
            }
            Err(e) => {
                tracing::warn!("Refreshing {} failed: {}", E::COLLECTION, e);
                SyncOutcome::Failed(e.into())
            }
        }
    }

    /// Runs one job on the background worker.
    async fn run(&self, kind: JobKind) -> SyncOutcome {
        match kind {
            JobKind::Replay { op_id } => self.replay(op_id).await,
            JobKind::Refresh { owner_id } => self.refresh(&owner_id).await,
        }
    }
}

async fn run_worker<E: SyncEntity>(shared: Arc<Shared<E>>, mut jobs: mpsc::Receiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let outcome = shared.run(job.kind).await;
        let _ = job.done.send(outcome);
    }
    tracing::debug!("{} sync worker stopped", E::ENTITY_TYPE);
}

/// Optimistic CRUD facade for one entity type.
pub struct OptimisticService<E: SyncEntity> {
    shared: Arc<Shared<E>>,
    jobs: mpsc::Sender<Job>,
}

impl<E: SyncEntity> Clone for OptimisticService<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            jobs: self.jobs.clone(),
        }
    }
}

impl<E: SyncEntity> OptimisticService<E> {
    /// Creates the service and spawns its background worker. Must be called
    /// inside a tokio runtime.
    pub fn new(
        api: Arc<dyn EntityApi<E>>,
        local: LocalStore<E>,
        queue: Arc<OperationQueue>,
        network: Arc<NetworkMonitor>,
        capacity: usize,
    ) -> Self {
        let shared = Arc::new(Shared {
            api,
            local,
            queue,
            network,
        });
        let (jobs, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(shared.clone(), rx));
        Self { shared, jobs }
    }

    /// Hands a job to the background worker. Offline, or with the worker
    /// saturated, the job is skipped; queued operations then wait for the
    /// next drain.
    fn submit(&self, kind: JobKind) -> SyncTicket {
        if !self.shared.network.is_online() {
            return SyncTicket::ready(kind.skipped());
        }

        let (done, rx) = oneshot::channel();
        match self.jobs.try_send(Job { kind, done }) {
            Ok(()) => SyncTicket(TicketState::Pending(rx)),
            Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => {
                tracing::debug!("{} sync worker busy, leaving work queued", E::ENTITY_TYPE);
                SyncTicket::ready(job.kind.skipped())
            }
        }
    }

    /// Reserves the operation's place in the queue, then asks the worker to
    /// run it right away. Work on a temporary id waits for its create.
    fn sync(
        &self,
        kind: OperationKind,
        id: &EntityId,
        payload: Result<serde_json::Value, SyncError>,
    ) -> SyncTicket {
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Cannot queue {} {} {}: {}", kind, E::ENTITY_TYPE, id, e);
                return SyncTicket::ready(SyncOutcome::Failed(e));
            }
        };

        let op = self
            .shared
            .queue
            .enqueue(kind, E::ENTITY_TYPE, id.clone(), payload, None);
        if kind != OperationKind::Create && id.is_temporary() {
            return SyncTicket::ready(SyncOutcome::Queued);
        }
        self.submit(JobKind::Replay { op_id: op.id })
    }

    pub fn create(&self, input: E::Input) -> Mutation<E> {
        let id = EntityId::temporary();
        let entity = E::from_input(id.clone(), &input);
        self.shared.local.mutate(|entities| {
            entities.push(entity.clone());
            ((), true)
        });
        tracing::debug!("Created {} {} locally", E::ENTITY_TYPE, id);

        let ticket = self.sync(OperationKind::Create, &id, payload(&input));
        Mutation {
            value: entity,
            ticket,
        }
    }

    pub fn update(&self, id: &EntityId, changes: E::Changes) -> Result<Mutation<E>, ServiceError> {
        let entity = self
            .shared
            .local
            .mutate(|entities| match entities.iter_mut().find(|e| e.id() == id) {
                Some(entity) => {
                    entity.apply_changes(&changes);
                    (Some(entity.clone()), true)
                }
                None => (None, false),
            })
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;

        let ticket = self.sync(OperationKind::Update, id, payload(&changes));
        Ok(Mutation {
            value: entity,
            ticket,
        })
    }

    pub fn delete(&self, id: &EntityId) -> Result<Mutation<E>, ServiceError> {
        let removed = self
            .shared
            .local
            .mutate(|entities| match entities.iter().position(|e| e.id() == id) {
                Some(idx) => (Some(entities.remove(idx)), true),
                None => (None, false),
            })
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;

        if id.is_temporary() {
            let cancelled = self.shared.queue.remove_by_entity(id);
            tracing::debug!(
                "Deleted unsynced {} {}, cancelled {} operation(s)",
                E::ENTITY_TYPE,
                id,
                cancelled
            );
            return Ok(Mutation {
                value: removed,
                ticket: SyncTicket::ready(SyncOutcome::LocalOnly),
            });
        }

        let ticket = self.sync(OperationKind::Delete, id, Ok(serde_json::Value::Null));
        Ok(Mutation {
            value: removed,
            ticket,
        })
    }

    /// Sets the favorite flag with a narrow update.
    pub fn toggle_flag(&self, id: &EntityId, value: bool) -> Result<Mutation<E>, ServiceError> {
        self.update(id, E::flag_changes(value))
    }

    /// Returns the local entities of `owner_id` and, when online, refreshes
    /// them from the server in the background.
    pub fn list(&self, owner_id: &str) -> Mutation<Vec<E>> {
        let value = self.cached(owner_id);
        let ticket = self.submit(JobKind::Refresh {
            owner_id: owner_id.to_string(),
        });
        Mutation { value, ticket }
    }

    /// Local entities of `owner_id`, without a refresh.
    pub fn cached(&self, owner_id: &str) -> Vec<E> {
        self.shared
            .local
            .snapshot()
            .into_iter()
            .filter(|e| e.owner_id() == owner_id)
            .collect()
    }

    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.shared.local.get(id)
    }

    /// Replays queued operations for this entity type. Register it with the
    /// sync coordinator under `E::ENTITY_TYPE`.
    pub fn handler(&self) -> Arc<dyn OperationHandler> {
        Arc::new(QueueHandler {
            shared: self.shared.clone(),
        })
    }
}

struct QueueHandler<E: SyncEntity> {
    shared: Arc<Shared<E>>,
}

impl<E: SyncEntity> OperationHandler for QueueHandler<E> {
    fn handle<'a>(&'a self, op: &'a Operation) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(self.shared.apply(op))
    }
}
