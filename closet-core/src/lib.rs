//! Closet Core Library
//!
//! Wardrobe models and the offline-first sync engine shared by the Closet
//! binaries.

pub mod api;
pub mod config;
pub mod models;
pub mod service;
pub mod storage;
pub mod sync;

pub use api::{ApiClient, ApiError, EntityApi, HttpEntityApi, HttpProbe};
pub use config::SyncConfig;
pub use models::{
    Category, EntityId, Item, ItemChanges, ItemInput, Outfit, OutfitChanges, OutfitInput,
    SyncEntity,
};
pub use service::{
    ItemService, LocalStore, Mutation, OptimisticService, OutfitService, ServiceError,
    SyncOutcome, SyncTicket,
};
pub use storage::{FileStore, KvStore, MemoryStore, PersistenceError};
pub use sync::{
    ConflictStrategy, NetworkMonitor, NetworkState, OperationQueue, SyncCoordinator, SyncError,
    SyncResult, SyncState, SyncStatus,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
