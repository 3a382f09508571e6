//! # Event bus for broadcasting gate decisions.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets
//! the engine publish [`GateEvent`]s without blocking inside its critical
//! section.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks or awaits.
//! - **Bounded capacity**: a single ring buffer stores recent events for
//!   all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip
//!   the `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send
//!   time; durable state lives in the snapshot store, not here.

use tokio::sync::broadcast;

use super::event::GateEvent;

/// Broadcast channel for gate events.
///
/// Cheap to clone (internally an `Arc`-backed sender); multiple publishers
/// can publish concurrently and each subscriber receives its own clone of
/// every event.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<GateEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<GateEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers the event is dropped; publish still
    /// returns immediately.
    pub fn publish(&self, ev: GateEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver observing subsequent events.
    ///
    /// A receiver only sees events sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(GateEvent::new(EventKind::Admitted, "jobA", "build", 1));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::Admitted);
        assert_eq!(ev.build, 1);
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = Bus::new(1);
        bus.publish(GateEvent::new(EventKind::Released, "jobA", "build", 1));
    }
}
