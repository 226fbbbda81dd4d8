//! Offline sync engine.
//!
//! Mutations made while offline are recorded as [`Operation`]s in the durable
//! [`OperationQueue`]. The [`SyncCoordinator`] replays them against the
//! registered [`OperationHandler`]s whenever the [`NetworkMonitor`] reports
//! connectivity: on reconnect, on a periodic timer, or on demand.

mod conflict;
mod coordinator;
mod error;
mod network;
mod operation;
mod queue;
mod status;

pub use conflict::{resolve_conflict, ConflictStrategy};
pub use coordinator::{ManualResolver, OperationHandler, SyncCoordinator, SyncLoop, SyncResult};
pub use error::SyncError;
pub use network::{
    ConnectivityProbe, ListenerId, NetworkMonitor, NetworkState, ProbeError, Transition,
};
pub use operation::{Operation, OperationId, OperationKind, OperationStatus};
pub use queue::{OperationQueue, QueueStats, QUEUE_KEY};
pub use status::{SyncState, SyncStatus};
