//! # Broadcast bus for supervisor events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the supervisor core can
//! publish [`Event`]s without knowing who is listening. Dispatch workers and
//! tests subscribe independently; each receiver sees every event published
//! after its subscription, in publication order.
//!
//! Publishing is non-blocking and fire-and-forget: with no subscribers the
//! event is dropped, which is fine — the supervisor operates the same with
//! or without observers.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervisor events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
