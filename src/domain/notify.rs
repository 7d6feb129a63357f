//! Change notifications
//!
//! Domain caches publish every update and invalidation on a broadcast
//! channel so observers can re-render.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    Profile,
    Social,
    Search,
    Feed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Updated,
    Invalidated,
}

/// One change event. For pattern invalidations `key` holds the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataChange {
    pub domain: CacheDomain,
    pub key: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<DataChange>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DataChange> {
        self.tx.subscribe()
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn notify(&self, domain: CacheDomain, key: impl Into<String>, kind: ChangeKind) {
        let change = DataChange {
            domain,
            key: key.into(),
            kind,
        };
        if self.tx.send(change).is_err() {
            trace!("No change subscribers");
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_changes() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();

        notifier.notify(CacheDomain::Profile, "profile:u1", ChangeKind::Updated);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.domain, CacheDomain::Profile);
        assert_eq!(change.key, "profile:u1");
        assert_eq!(change.kind, ChangeKind::Updated);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = ChangeNotifier::default();
        notifier.notify(CacheDomain::Feed, "feed:activity:", ChangeKind::Invalidated);
    }
}
