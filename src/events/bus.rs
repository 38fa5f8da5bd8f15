//! # Event bus for broadcasting push dispatch events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] through which the
//! watchdog, dispatcher, and callbacks publish [`PushEvent`]s to any number
//! of independent receivers.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: all active receivers get a clone of each event
//! - **Non-persistent**: events are dropped if nobody is subscribed
//! - **Bounded capacity**: lagging receivers skip old events

use tokio::sync::broadcast;

use super::event::PushEvent;

/// Broadcast channel for push dispatch events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<PushEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped silently; the core
    /// operates without observers.
    pub fn publish(&self, ev: PushEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that gets all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }
}
