//! Connectivity tracking.
//!
//! The monitor keeps the last known [`NetworkState`] and turns raw
//! connectivity events into edge-triggered online/offline transitions. Reads
//! never block; they return whatever was last reported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Connectivity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_connected: bool,
    /// `None` until the first reachability probe completes.
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: Some(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: Some(false),
        }
    }

    /// Connected with reachability not yet known.
    pub fn unknown() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: None,
        }
    }

    /// Connected and not known to be unreachable.
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable != Some(false)
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::unknown()
    }
}

/// What an update did to the derived online flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    WentOnline,
    WentOffline,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Connectivity probe unavailable: {0}")]
    Unavailable(String),
}

/// Platform connectivity source.
pub trait ConnectivityProbe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, Result<NetworkState, ProbeError>>;
}

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeListener = Arc<dyn Fn(&NetworkState) + Send + Sync>;
type ReconnectListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    change: Vec<(ListenerId, ChangeListener)>,
    reconnect: Vec<(ListenerId, ReconnectListener)>,
}

/// Tracks connectivity and notifies listeners on online/offline edges.
pub struct NetworkMonitor {
    state: Mutex<NetworkState>,
    state_tx: watch::Sender<NetworkState>,
    listeners: Mutex<Listeners>,
    next_listener: AtomicU64,
}

impl NetworkMonitor {
    /// Starts connected with reachability unknown, which counts as online.
    pub fn new() -> Self {
        Self::with_state(NetworkState::default())
    }

    pub fn with_state(initial: NetworkState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            state: Mutex::new(initial),
            state_tx,
            listeners: Mutex::new(Listeners::default()),
            next_listener: AtomicU64::new(1),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> NetworkState {
        *self.lock_state()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Records a connectivity event.
    ///
    /// Listeners only hear about changes of the derived online flag; an
    /// offline→online edge additionally fires every reconnect listener once.
    pub fn apply(&self, next: NetworkState) -> Transition {
        let transition = {
            let mut state = self.lock_state();
            let was_online = state.is_online();
            *state = next;
            match (was_online, next.is_online()) {
                (false, true) => Transition::WentOnline,
                (true, false) => Transition::WentOffline,
                _ => Transition::Unchanged,
            }
        };

        if transition == Transition::Unchanged {
            return transition;
        }

        self.state_tx.send_replace(next);

        let (change, reconnect) = {
            let listeners = self.lock_listeners();
            let change: Vec<ChangeListener> =
                listeners.change.iter().map(|(_, l)| l.clone()).collect();
            let reconnect: Vec<ReconnectListener> = if transition == Transition::WentOnline {
                listeners.reconnect.iter().map(|(_, l)| l.clone()).collect()
            } else {
                Vec::new()
            };
            (change, reconnect)
        };

        match transition {
            Transition::WentOnline => tracing::info!("Network: online"),
            Transition::WentOffline => tracing::warn!("Network: offline"),
            Transition::Unchanged => {}
        }

        for listener in change {
            listener(&next);
        }
        for listener in reconnect {
            listener();
        }

        transition
    }

    /// Called with the new state on every online/offline flip.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NetworkState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.lock_listeners().change.push((id, Arc::new(listener)));
        id
    }

    /// Called once per offline→online edge.
    pub fn on_reconnect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.lock_listeners().reconnect.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.change.len() + listeners.reconnect.len();
        listeners.change.retain(|(lid, _)| *lid != id);
        listeners.reconnect.retain(|(lid, _)| *lid != id);
        before != listeners.change.len() + listeners.reconnect.len()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed))
    }

    /// Watch channel that changes on every online/offline flip.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state_tx.subscribe()
    }

    /// Polls `probe` once. An unavailable probe is treated as online so a
    /// broken platform API never blocks syncing.
    pub async fn refresh(&self, probe: &dyn ConnectivityProbe) -> Transition {
        match probe.probe().await {
            Ok(state) => self.apply(state),
            Err(e) => {
                tracing::warn!("{}; assuming online", e);
                self.apply(NetworkState::unknown())
            }
        }
    }

    /// Polls `probe` on a fixed interval until the task is aborted.
    pub fn watch_probe(
        self: Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        every: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh(probe.as_ref()).await;
            }
        })
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FixedProbe(Result<NetworkState, ()>);

    impl ConnectivityProbe for FixedProbe {
        fn probe(&self) -> BoxFuture<'_, Result<NetworkState, ProbeError>> {
            let result = self
                .0
                .map_err(|_| ProbeError::Unavailable("no platform api".into()));
            Box::pin(async move { result })
        }
    }

    #[test]
    fn test_is_online_derivation() {
        assert!(NetworkState::online().is_online());
        assert!(NetworkState::unknown().is_online());
        assert!(!NetworkState::offline().is_online());
        assert!(!NetworkState {
            is_connected: true,
            is_internet_reachable: Some(false)
        }
        .is_online());
        assert!(!NetworkState {
            is_connected: false,
            is_internet_reachable: None
        }
        .is_online());
    }

    #[test]
    fn test_default_is_optimistically_online() {
        let monitor = NetworkMonitor::new();
        assert!(monitor.is_online());
        assert_eq!(monitor.state().is_internet_reachable, None);
    }

    #[test]
    fn test_transitions_are_edge_detected() {
        let monitor = NetworkMonitor::new();
        assert_eq!(monitor.apply(NetworkState::online()), Transition::Unchanged);
        assert_eq!(monitor.apply(NetworkState::offline()), Transition::WentOffline);
        assert_eq!(monitor.apply(NetworkState::offline()), Transition::Unchanged);
        assert_eq!(monitor.apply(NetworkState::unknown()), Transition::WentOnline);
    }

    #[test]
    fn test_one_reconnect_per_edge() {
        let monitor = NetworkMonitor::with_state(NetworkState::offline());
        let reconnects = Arc::new(AtomicUsize::new(0));
        let counter = reconnects.clone();
        monitor.on_reconnect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // noisy platform: repeated events with the same derived value
        monitor.apply(NetworkState::online());
        monitor.apply(NetworkState::online());
        monitor.apply(NetworkState::unknown());
        assert_eq!(reconnects.load(Ordering::SeqCst), 1);

        monitor.apply(NetworkState::offline());
        monitor.apply(NetworkState::offline());
        monitor.apply(NetworkState::online());
        assert_eq!(reconnects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_change_listeners_and_removal() {
        let monitor = NetworkMonitor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = monitor.on_change(move |state| {
            sink.lock().unwrap().push(state.is_online());
        });

        monitor.apply(NetworkState::offline());
        monitor.apply(NetworkState::online());
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);

        assert!(monitor.remove_listener(id));
        monitor.apply(NetworkState::offline());
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(!monitor.remove_listener(id));
    }

    #[test]
    fn test_subscribe_sees_flips() {
        let monitor = NetworkMonitor::new();
        let mut rx = monitor.subscribe();
        assert!(!rx.has_changed().unwrap());

        monitor.apply(NetworkState::online());
        assert!(!rx.has_changed().unwrap());

        monitor.apply(NetworkState::offline());
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_online());
    }

    #[tokio::test]
    async fn test_refresh_with_failing_probe_assumes_online() {
        let monitor = NetworkMonitor::with_state(NetworkState::offline());
        let transition = monitor.refresh(&FixedProbe(Err(()))).await;
        assert_eq!(transition, Transition::WentOnline);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_refresh_applies_probe_result() {
        let monitor = NetworkMonitor::new();
        let transition = monitor
            .refresh(&FixedProbe(Ok(NetworkState::offline())))
            .await;
        assert_eq!(transition, Transition::WentOffline);
        assert!(!monitor.is_online());
    }
}
