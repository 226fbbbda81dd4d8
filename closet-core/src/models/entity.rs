use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use super::EntityId;

/// A domain entity that the sync engine can replicate.
///
/// `Input` carries everything needed to create the entity remotely and
/// `Changes` is a partial update where unset fields are left untouched.
pub trait SyncEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Input: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;
    type Changes: Clone + Debug + Default + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Routing name used for queued operations.
    const ENTITY_TYPE: &'static str;
    /// Remote collection name.
    const COLLECTION: &'static str;

    fn id(&self) -> &EntityId;
    fn set_id(&mut self, id: EntityId);
    fn owner_id(&self) -> &str;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Build the local copy shown before the remote store has seen it.
    fn from_input(id: EntityId, input: &Self::Input) -> Self;

    fn apply_changes(&mut self, changes: &Self::Changes);

    /// The narrow update that sets the entity's favorite flag.
    fn flag_changes(value: bool) -> Self::Changes;
}
