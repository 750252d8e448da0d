//! Change feed published by `Storage` after every write.
//!
//! Replaces timer polling: consumers hold a `broadcast::Receiver` and
//! recompute their derived views when a collection they read has changed.
//! The channel works without a Tokio runtime (`send`/`try_recv` are sync).

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use super::Collection;

/// Buffered events per subscriber before it starts lagging.
const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Saved,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// Record count after the write, for array collections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    pub at: String,
}

impl StoreEvent {
    pub fn new(collection: Collection, kind: ChangeKind, records: Option<usize>) -> Self {
        Self {
            collection,
            kind,
            records,
            at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: StoreEvent) -> usize {
        // No subscribers is the normal case for one-shot CLI runs
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        assert_eq!(
            feed.publish(StoreEvent::new(Collection::Clients, ChangeKind::Saved, Some(0))),
            0
        );
    }

    #[test]
    fn test_every_subscriber_gets_the_event() {
        let feed = ChangeFeed::new();
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        let delivered = feed.publish(StoreEvent::new(Collection::Tasks, ChangeKind::Saved, Some(2)));
        assert_eq!(delivered, 2);
        assert_eq!(a.try_recv().expect("a").collection, Collection::Tasks);
        assert_eq!(b.try_recv().expect("b").records, Some(2));
    }

    #[test]
    fn test_slow_subscriber_observes_lag() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        for _ in 0..(CHANGE_FEED_CAPACITY + 5) {
            feed.publish(StoreEvent::new(Collection::Clients, ChangeKind::Saved, None));
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(_))));
    }
}
