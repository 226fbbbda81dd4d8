//! In-memory entity server for tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use super::{ApiError, EntityApi};
use crate::models::{EntityId, SyncEntity};

pub(crate) struct MemoryApi<E> {
    entities: Mutex<Vec<E>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl<E: SyncEntity> MemoryApi<E> {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call waits for a permit on the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (api, gate)
    }

    /// Make every call fail with a retryable error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn entities(&self) -> Vec<E> {
        self.entities.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Insert an entity directly, bypassing the call log.
    pub fn seed(&self, input: &E::Input) -> E {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entity = E::from_input(EntityId::persisted(id.to_string()), input);
        self.entities.lock().unwrap().push(entity.clone());
        entity
    }

    pub fn remove(&self, id: &str) {
        self.entities
            .lock()
            .unwrap()
            .retain(|e| e.id().remote() != Some(id));
    }

    async fn enter(&self, call: String) -> Result<(), ApiError> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|e| ApiError::Fatal(e.to_string()))?;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Retryable("connection refused".into()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl<E: SyncEntity> EntityApi<E> for MemoryApi<E> {
    fn create<'a>(&'a self, input: &'a E::Input) -> BoxFuture<'a, Result<E, ApiError>> {
        Box::pin(async move {
            self.enter("create".into()).await?;
            Ok(self.seed(input))
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        changes: &'a E::Changes,
    ) -> BoxFuture<'a, Result<E, ApiError>> {
        Box::pin(async move {
            self.enter(format!("update {}", id)).await?;
            let mut entities = self.entities.lock().unwrap();
            let entity = entities
                .iter_mut()
                .find(|e| e.id().remote() == Some(id))
                .ok_or_else(|| ApiError::Fatal(format!("{} not found", id)))?;
            entity.apply_changes(changes);
            Ok(entity.clone())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            self.enter(format!("delete {}", id)).await?;
            self.remove(id);
            Ok(())
        })
    }

    fn list<'a>(&'a self, owner_id: &'a str) -> BoxFuture<'a, Result<Vec<E>, ApiError>> {
        Box::pin(async move {
            self.enter("list".into()).await?;
            Ok(self
                .entities()
                .into_iter()
                .filter(|e| e.owner_id() == owner_id)
                .collect())
        })
    }
}
