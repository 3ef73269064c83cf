//! Observer registry with best-effort fan-out.
//!
//! [`EventBroadcaster`] keeps one unbounded channel per observer. Publishing
//! pushes a clone of the event into every channel; an observer whose
//! receiving half has been dropped is removed on the spot and never holds
//! up delivery to the others. Observers only see events published after
//! they subscribe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::event::JobEvent;

/// Identifies one observer for the lifetime of the broadcaster.
pub type ObserverId = u64;

/// Receiving half handed to a new observer.
pub struct Subscription {
    pub id: ObserverId,
    pub receiver: mpsc::UnboundedReceiver<JobEvent>,
}

/// Fan-out hub for [`JobEvent`]s.
///
/// Designed to be wrapped in `Arc` and shared. The observer set sits behind
/// a single mutex which `publish` holds for the whole fan-out, so every
/// observer receives events in the same relative order.
pub struct EventBroadcaster {
    observers: Mutex<HashMap<ObserverId, mpsc::UnboundedSender<JobEvent>>>,
    next_id: AtomicU64,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new observer. No backlog is replayed.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().await.insert(id, tx);
        tracing::debug!(observer_id = id, "Observer subscribed");
        Subscription { id, receiver: rx }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: ObserverId) {
        if self.observers.lock().await.remove(&id).is_some() {
            tracing::debug!(observer_id = id, "Observer unsubscribed");
        }
    }

    /// Deliver `event` to every current observer.
    ///
    /// Returns the number of observers the event reached. Observers whose
    /// channel is closed are dropped from the set.
    pub async fn publish(&self, event: JobEvent) -> usize {
        let mut observers = self.observers.lock().await;
        let mut delivered = 0;

        observers.retain(|id, sender| match sender.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(observer_id = id, "Dropping closed observer");
                false
            }
        });

        delivered
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Drop every observer channel, ending their receive loops.
    ///
    /// Used during graceful shutdown.
    pub async fn close_all(&self) {
        let mut observers = self.observers.lock().await;
        let count = observers.len();
        observers.clear();
        tracing::info!(count, "Closed all event observers");
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
