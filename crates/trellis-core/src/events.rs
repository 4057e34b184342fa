//! Fan-out of recompute results to connected clients

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::model::GraphSnapshot;

/// Default capacity of the broadcast channel. Slow clients past this many
/// unread events are marked lagged and resynchronised from the cache.
pub const EVENT_CAPACITY: usize = 64;

/// Outcome of one recompute, as seen by clients.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A new snapshot was published.
    Updated(Arc<GraphSnapshot>),
    /// The run failed; the cached snapshot is untouched.
    Failed { run: u64, message: String },
}

impl GraphEvent {
    /// Sequence number of the recompute this event reports on.
    pub fn run(&self) -> u64 {
        match self {
            GraphEvent::Updated(snapshot) => snapshot.run(),
            GraphEvent::Failed { run, .. } => *run,
        }
    }
}

/// Cloneable handle delivering [`GraphEvent`]s to every subscriber in publish order.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<GraphEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Broadcaster { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers. Returns how many received it.
    pub fn send(&self, event: GraphEvent) -> usize {
        // no receivers just means no clients are connected
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Graph;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_without_subscribers() {
        let broadcaster = Broadcaster::default();
        let delivered = broadcaster.send(GraphEvent::Failed { run: 1, message: "x".into() });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_delivery_order_matches_publish_order() {
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();

        let snapshot = Arc::new(GraphSnapshot::new(1, Graph::new(), Duration::ZERO));
        broadcaster.send(GraphEvent::Updated(snapshot));
        broadcaster.send(GraphEvent::Failed { run: 2, message: "boom".into() });

        assert_eq!(rx.recv().await.unwrap().run(), 1);
        match rx.recv().await.unwrap() {
            GraphEvent::Failed { run, message } => {
                assert_eq!(run, 2);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
