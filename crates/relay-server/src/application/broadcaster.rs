//! Process-wide fan-out of progress events.
//!
//! [`EventBroadcaster`] keeps one unbounded channel per subscriber.  Publishing
//! clones the event into every channel; a subscriber that went away is
//! dropped from the set on the next publish and never affects the others.
//!
//! There is no history: a subscriber sees only what is published after it
//! subscribed.  There is no backpressure either, since the channels are
//! unbounded.  This is a progress feed, not a reliable log.
//!
//! The broadcaster is an injected collaborator (`Arc<EventBroadcaster>`), not
//! a global.  The subscriber map sits behind a `std::sync::Mutex` because no
//! lock is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relay_core::DeliveryEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle returned by [`EventBroadcaster::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<DeliveryEvent>,
}

impl Subscription {
    /// Identifier to pass to [`EventBroadcaster::unsubscribe`].
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next event.  Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<DeliveryEvent> {
        self.receiver.recv().await
    }

    /// Returns the next already-published event without waiting.
    pub fn try_recv(&mut self) -> Option<DeliveryEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Fans [`DeliveryEvent`]s out to every current subscriber.
#[derive(Debug, Default)]
pub struct EventBroadcaster {
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<DeliveryEvent>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        debug!("event subscriber {id} attached");
        Subscription { id, receiver: rx }
    }

    /// Removes a subscriber.  Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!("event subscriber {id} detached");
        }
        removed
    }

    /// Sends `event` to every subscriber and logs it.
    ///
    /// Best-effort: subscribers whose receiving end is gone are pruned.
    /// Returns how many subscribers the event reached.
    pub fn publish(&self, event: &DeliveryEvent) -> usize {
        log_event(event);

        let mut subscribers = self.lock();
        subscribers.retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!("pruning closed event subscriber {id}");
            }
            alive
        });
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::UnboundedSender<DeliveryEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_event(event: &DeliveryEvent) {
    match event {
        DeliveryEvent::Status { message } => info!("{message}"),
        DeliveryEvent::Success { message } => info!("SUCCESS: {message}"),
        DeliveryEvent::Error { message } => warn!("{message}"),
        DeliveryEvent::Data { length, .. } => debug!("data event ({length} bytes)"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
