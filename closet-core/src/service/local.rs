use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::{EntityId, SyncEntity};
use crate::storage::KvStore;

/// Locally visible entities of one type, in insertion order.
///
/// Optionally mirrored to a [`KvStore`] under `<collection>_cache` so the
/// optimistic view survives restarts. Persistence failures are logged and the
/// in-memory copy stays authoritative.
pub struct LocalStore<E> {
    entities: Mutex<Vec<E>>,
    store: Option<Arc<dyn KvStore>>,
}

impl<E: SyncEntity> LocalStore<E> {
    pub fn in_memory() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
            store: None,
        }
    }

    /// Restores the cached snapshot from `store`, skipping malformed entries.
    pub fn persistent(store: Arc<dyn KvStore>) -> Self {
        let key = Self::key();
        let entities = match store.get(&key) {
            Ok(Some(contents)) => match serde_json::from_str::<Vec<serde_json::Value>>(&contents) {
                Ok(values) => values
                    .into_iter()
                    .filter_map(|value| match serde_json::from_value::<E>(value) {
                        Ok(entity) => Some(entity),
                        Err(e) => {
                            tracing::warn!("Dropping malformed cached {}: {}", E::ENTITY_TYPE, e);
                            None
                        }
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable {} cache: {}", E::COLLECTION, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read {} cache: {}", E::COLLECTION, e);
                Vec::new()
            }
        };

        Self {
            entities: Mutex::new(entities),
            store: Some(store),
        }
    }

    fn key() -> String {
        format!("{}_cache", E::COLLECTION)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<E>> {
        self.entities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Vec<E> {
        self.lock().clone()
    }

    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.lock().iter().find(|e| e.id() == id).cloned()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().iter().any(|e| e.id() == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs `f` under the store lock and persists when it reports a change.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Vec<E>) -> (R, bool)) -> R {
        let mut entities = self.lock();
        let (result, changed) = f(&mut entities);
        if changed {
            self.persist(&entities);
        }
        result
    }

    fn persist(&self, entities: &[E]) {
        let Some(store) = &self.store else {
            return;
        };
        match serde_json::to_string(entities) {
            Ok(json) => {
                if let Err(e) = store.set(&Self::key(), &json) {
                    tracing::error!("Failed to persist {} cache: {}", E::COLLECTION, e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize {} cache: {}", E::COLLECTION, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ItemInput};
    use crate::storage::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn item(name: &str) -> Item {
        Item::from_input(EntityId::temporary(), &ItemInput::new("user1", name))
    }

    #[test]
    fn test_mutate_and_get() {
        let local = LocalStore::<Item>::in_memory();
        let shirt = item("Shirt");
        local.mutate(|entities| {
            entities.push(shirt.clone());
            ((), true)
        });

        assert_eq!(local.len(), 1);
        assert_eq!(local.get(&shirt.id).unwrap().name, "Shirt");
        assert!(!local.contains(&EntityId::persisted("nope")));
    }

    #[test]
    fn test_persistent_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn KvStore> = Arc::new(FileStore::new(temp_dir.path()));

        let local = LocalStore::<Item>::persistent(store.clone());
        assert!(local.is_empty());
        local.mutate(|entities| {
            entities.push(item("Scarf"));
            entities.push(item("Boots"));
            ((), true)
        });

        let reloaded = LocalStore::<Item>::persistent(store);
        let names: Vec<_> = reloaded.snapshot().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Scarf", "Boots"]);
    }

    #[test]
    fn test_malformed_cache_entries_are_dropped() {
        let store = Arc::new(MemoryStore::new());
        let good = serde_json::to_value(item("Belt")).unwrap();
        let contents = serde_json::json!([good, { "name": "missing fields" }]).to_string();
        store.set("items_cache", &contents).unwrap();

        let local = LocalStore::<Item>::persistent(store);
        assert_eq!(local.len(), 1);
        assert_eq!(local.snapshot()[0].name, "Belt");
    }
}
