//! Connectivity signal
//!
//! The host owns a [`ConnectivityMonitor`] and pushes network changes into
//! it; cache components hold cheap read-only [`Connectivity`] handles.

use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_expensive: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            is_connected: true,
            is_expensive: false,
        }
    }
}

// == Connectivity Monitor ==
/// Writable side of the connectivity signal.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectivityMonitor {
    /// Starts connected on an inexpensive link.
    pub fn new() -> Self {
        Self::with_state(ConnectionState::default())
    }

    pub fn with_state(state: ConnectionState) -> Self {
        let (tx, _) = watch::channel(state);
        Self { tx }
    }

    /// Returns a read-only handle for components.
    pub fn handle(&self) -> Connectivity {
        Connectivity {
            rx: self.tx.subscribe(),
        }
    }

    pub fn update(&self, state: ConnectionState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(
                "Connectivity changed: connected={}, expensive={}",
                state.is_connected, state.is_expensive
            );
        }
    }

    pub fn set_connected(&self, is_connected: bool) {
        let state = ConnectionState {
            is_connected,
            ..*self.tx.borrow()
        };
        self.update(state);
    }

    pub fn set_expensive(&self, is_expensive: bool) {
        let state = ConnectionState {
            is_expensive,
            ..*self.tx.borrow()
        };
        self.update(state);
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

// == Connectivity Handle ==
/// Read-only view of the connectivity signal.
#[derive(Debug, Clone)]
pub struct Connectivity {
    rx: watch::Receiver<ConnectionState>,
}

impl Connectivity {
    /// A handle fixed to `state`, for hosts without a network monitor.
    pub fn fixed(state: ConnectionState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    pub fn state(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected
    }

    pub fn is_expensive(&self) -> bool {
        self.state().is_expensive
    }

    /// Waits for the next change. Returns `None` once the monitor is dropped.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_connected() {
        let monitor = ConnectivityMonitor::new();
        let handle = monitor.handle();
        assert!(handle.is_connected());
        assert!(!handle.is_expensive());
    }

    #[test]
    fn test_updates_visible_to_handles() {
        let monitor = ConnectivityMonitor::new();
        let handle = monitor.handle();

        monitor.set_connected(false);
        assert!(!handle.is_connected());

        monitor.set_expensive(true);
        assert!(handle.is_expensive());
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_changed_stream() {
        let monitor = ConnectivityMonitor::new();
        let mut handle = monitor.handle();

        monitor.set_connected(false);
        let state = handle.changed().await.unwrap();
        assert!(!state.is_connected);

        drop(monitor);
        assert!(handle.changed().await.is_none());
    }

    #[test]
    fn test_fixed_handle() {
        let handle = Connectivity::fixed(ConnectionState {
            is_connected: false,
            is_expensive: false,
        });
        assert!(!handle.is_connected());
    }
}
