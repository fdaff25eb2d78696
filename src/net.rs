//! Network state tracking.
//!
//! A two-state machine (`Online` / `Offline`) fed by the host's
//! connectivity events. The monitor itself has no side effects; the
//! engine subscribes to transitions and triggers queue drains on
//! `Offline → Online`.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Current connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Online,
    Offline,
}

impl NetworkState {
    /// Convenience predicate.
    pub fn is_online(self) -> bool {
        self == NetworkState::Online
    }
}

/// The host's connectivity signal (external collaborator).
///
/// Supplies the initial state at startup. Subsequent transitions are
/// delivered by the host calling [`NetworkMonitor::set_online()`].
pub trait ConnectivitySignal: Send + Sync {
    /// Whether the runtime currently reports connectivity.
    fn is_online(&self) -> bool;
}

/// A fixed connectivity signal; useful as a default and in tests.
pub struct StaticSignal(pub bool);

impl ConnectivitySignal for StaticSignal {
    fn is_online(&self) -> bool {
        self.0
    }
}

/// Tracks connectivity transitions and broadcasts them to subscribers.
pub struct NetworkMonitor {
    tx: watch::Sender<NetworkState>,
}

impl NetworkMonitor {
    /// Create a monitor with its initial state read from the signal.
    pub fn new(signal: &dyn ConnectivitySignal) -> Self {
        let initial = if signal.is_online() {
            NetworkState::Online
        } else {
            NetworkState::Offline
        };
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> NetworkState {
        *self.tx.borrow()
    }

    /// Whether the monitor currently reports Online.
    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Record a connectivity event from the host.
    ///
    /// No-op when the state is unchanged, so flapping event sources don't
    /// produce spurious transitions for subscribers.
    pub fn set_online(&self, online: bool) {
        let next = if online {
            NetworkState::Online
        } else {
            NetworkState::Offline
        };
        self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                debug!(from = ?state, to = ?next, "network transition");
                *state = next;
                true
            }
        });
    }

    /// Subscribe to state transitions.
    ///
    /// The receiver observes every change; the engine uses this to run
    /// drains on `Offline → Online`.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_from_signal() {
        assert!(NetworkMonitor::new(&StaticSignal(true)).is_online());
        assert!(!NetworkMonitor::new(&StaticSignal(false)).is_online());
    }

    #[tokio::test]
    async fn transition_is_observed_by_subscribers() {
        let monitor = NetworkMonitor::new(&StaticSignal(false));
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), NetworkState::Online);
    }

    #[tokio::test]
    async fn duplicate_events_do_not_notify() {
        let monitor = NetworkMonitor::new(&StaticSignal(true));
        let mut rx = monitor.subscribe();
        rx.mark_unchanged();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(false);
        assert!(rx.has_changed().unwrap());
    }
}
