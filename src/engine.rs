//! Wires the sync engine together for one CLI invocation.

use std::sync::Arc;

use closet_core::sync::Transition;
use closet_core::{
    ApiClient, FileStore, HttpEntityApi, HttpProbe, Item, ItemService, KvStore, LocalStore,
    NetworkMonitor, OperationQueue, Outfit, OutfitService, SyncCoordinator, SyncEntity,
};

use crate::config::Config;

pub struct Engine {
    pub network: Arc<NetworkMonitor>,
    pub queue: Arc<OperationQueue>,
    pub coordinator: Arc<SyncCoordinator>,
    pub items: ItemService,
    pub outfits: OutfitService,
    pub probe: Arc<HttpProbe>,
}

impl Engine {
    /// Restores the queue and caches from the data directory and probes the
    /// entity server once to learn whether we are online.
    pub async fn start(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&config.data_dir.value));
        let queue = Arc::new(OperationQueue::load(store.clone(), &config.sync));

        let client = ApiClient::new(
            config.api_url.value.clone(),
            config.api_key.clone(),
            config.sync.request_timeout(),
        )?;
        let probe = Arc::new(HttpProbe::new(client.clone()));

        let network = Arc::new(NetworkMonitor::new());
        if network.refresh(probe.as_ref()).await == Transition::WentOffline {
            tracing::info!(
                "Entity server {} unreachable, working offline",
                config.api_url.value
            );
        }

        let items = ItemService::new(
            Arc::new(HttpEntityApi::<Item>::new(client.clone())),
            LocalStore::persistent(store.clone()),
            queue.clone(),
            network.clone(),
            config.sync.background_capacity,
        );
        let outfits = OutfitService::new(
            Arc::new(HttpEntityApi::<Outfit>::new(client)),
            LocalStore::persistent(store),
            queue.clone(),
            network.clone(),
            config.sync.background_capacity,
        );

        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            network.clone(),
            config.sync.clone(),
        ));
        coordinator.register_handler(Item::ENTITY_TYPE, items.handler());
        coordinator.register_handler(Outfit::ENTITY_TYPE, outfits.handler());

        Ok(Self {
            network,
            queue,
            coordinator,
            items,
            outfits,
            probe,
        })
    }

    /// Drains whatever the command left queued, if the server is reachable.
    pub async fn flush(&self) {
        if self.network.is_online() && self.queue.stats().pending > 0 {
            let result = self.coordinator.sync_now().await;
            if result.failed_count > 0 {
                tracing::warn!("{} operation(s) failed to sync", result.failed_count);
            }
        }
    }
}

/// Finds an entity by id, or by case-insensitive name among `entities`.
pub fn resolve<E, F>(entities: &[E], identifier: &str, name: F) -> Option<E>
where
    E: SyncEntity,
    F: Fn(&E) -> &str,
{
    let identifier = identifier.trim();
    entities
        .iter()
        .find(|e| e.id().to_string() == identifier)
        .or_else(|| {
            entities
                .iter()
                .find(|e| name(e).eq_ignore_ascii_case(identifier))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use closet_core::{EntityId, ItemInput};

    fn items() -> Vec<Item> {
        vec![
            Item::from_input(EntityId::persisted("42"), &ItemInput::new("me", "Rain jacket")),
            Item::from_input(EntityId::temporary(), &ItemInput::new("me", "Boots")),
        ]
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let items = items();
        assert_eq!(resolve(&items, "42", |i| i.name.as_str()).unwrap().name, "Rain jacket");
        assert_eq!(resolve(&items, "rain JACKET", |i| i.name.as_str()).unwrap().name, "Rain jacket");

        let temp = items[1].id.to_string();
        assert_eq!(resolve(&items, &temp, |i| i.name.as_str()).unwrap().name, "Boots");
        assert!(resolve(&items, "sandals", |i| i.name.as_str()).is_none());
    }
}
