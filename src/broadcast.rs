//! Snapshot fan-out and subscriber lifecycle.
//!
//! Each published tick is wrapped in an `Arc` and pushed through a tokio
//! broadcast channel; join/leave never touches the sampling clock. Delivery
//! is fire-and-forget: a subscriber that falls behind loses the missed ticks
//! instead of receiving replays.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::types::{ProcessEntry, SystemStats};

/// One tick's published payload, shared by every live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct TickPayload {
    pub stats: SystemStats,
    pub processes: Vec<ProcessEntry>,
}

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<TickPayload>>,
    next_id: Arc<AtomicU64>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Broadcaster {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new subscriber. It only ever observes ticks published
    /// after this call.
    pub fn join(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.tx.subscribe();
        debug!(subscriber = id, total = self.tx.receiver_count(), "subscriber joined");
        Subscription { id, rx }
    }

    /// Push one tick to all current subscribers, returning the delivery
    /// count. With nobody listening this is a no-op.
    pub fn publish(&self, payload: TickPayload) -> usize {
        self.tx.send(Arc::new(payload)).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscriber handle. Dropping it is leaving.
pub struct Subscription {
    id: u64,
    rx: broadcast::Receiver<Arc<TickPayload>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next published tick. Returns `None` once the broadcaster
    /// is gone. Missed ticks under lag are skipped, never replayed.
    pub async fn next_tick(&mut self) -> Option<Arc<TickPayload>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(subscriber = self.id, missed, "subscriber lagging, dropping missed ticks");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscriber = self.id, "subscriber left");
    }
}
