//! # Lifecycle events published by the supervisor.
//!
//! Two kinds of event flow out of the supervisor core:
//! - [`EventKind::StateChanged`] on every lifecycle transition, carrying the
//!   new state plus the exit code/signal or error message where the
//!   transition has one;
//! - [`EventKind::TlsAssembled`] exactly once per entry into `Running`,
//!   carrying the harvested TLS bundle.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically with publication order. Consumers that receive events
//! through independent queues can re-establish the original order from it.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::state::LifecycleState;
use crate::tls::TlsConfig;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The lifecycle state machine moved to a new state.
    StateChanged,
    /// A TLS bundle was assembled while entering `Running`.
    TlsAssembled,
}

/// Supervisor event with optional transition metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// The new lifecycle state, for `StateChanged`.
    pub state: Option<LifecycleState>,
    /// Child exit code, when the transition was caused by an exit.
    pub code: Option<i32>,
    /// Child terminating signal, when the transition was caused by an exit.
    pub signal: Option<i32>,
    /// Error message, when the transition was caused by a channel error.
    pub error: Option<String>,
    /// The TLS bundle, for `TlsAssembled`.
    pub tls: Option<TlsConfig>,
}

impl Event {
    /// Creates an event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            state: None,
            code: None,
            signal: None,
            error: None,
            tls: None,
        }
    }

    /// A `StateChanged` event for `state`.
    pub fn state_changed(state: LifecycleState) -> Self {
        Event::now(EventKind::StateChanged).with_state(state)
    }

    /// A `TlsAssembled` event carrying `tls`.
    pub fn tls_assembled(tls: TlsConfig) -> Self {
        let mut ev = Event::now(EventKind::TlsAssembled);
        ev.tls = Some(tls);
        ev
    }

    /// Attaches the new lifecycle state.
    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a child exit code and signal.
    pub fn with_exit(mut self, code: Option<i32>, signal: Option<i32>) -> Self {
        self.code = code;
        self.signal = signal;
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::state_changed(LifecycleState::Starting);
        let b = Event::state_changed(LifecycleState::Running);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_attach_metadata() {
        let ev = Event::state_changed(LifecycleState::Crashed)
            .with_exit(Some(1), None)
            .with_error("boom");
        assert_eq!(ev.kind, EventKind::StateChanged);
        assert_eq!(ev.state, Some(LifecycleState::Crashed));
        assert_eq!(ev.code, Some(1));
        assert_eq!(ev.signal, None);
        assert_eq!(ev.error.as_deref(), Some("boom"));
    }
}
