//! # Event fan-out to listener and broadcast sinks.
//!
//! Every [`EventSink`] gets a dedicated worker that subscribes to the
//! [`Bus`] and delivers events one at a time. The supervisor core therefore
//! never awaits an observer: it publishes and moves on.
//!
//! ```text
//! Bus ──► worker 1 ──► ListenerSink  ──► LifecycleListener::on_*()
//!     └─► worker 2 ──► BroadcastSink ──► Broadcast::broadcast_*()
//! ```
//!
//! ## Rules
//! - Per-sink delivery is FIFO in publication order, so the listener and the
//!   broadcaster observe the same transition sequence.
//! - A panicking sink is caught with `catch_unwind`, logged, and skipped;
//!   the worker keeps processing.
//! - A lagging sink skips overwritten events (logged at `error`); lifecycle
//!   transitions are far rarer than the bus capacity, so lag means a stuck
//!   observer, not normal operation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use crate::broadcast::Broadcast;
use crate::listener::LifecycleListener;
use crate::state::LifecycleState;

use super::bus::Bus;
use super::event::{Event, EventKind};

/// Consumer of supervisor events, driven by a dedicated worker.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Handles a single event.
    async fn deliver(&self, ev: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Spawns one delivery worker per sink.
///
/// Workers run until the bus is closed (all senders dropped).
pub(crate) fn spawn_sinks(bus: &Bus, sinks: Vec<Arc<dyn EventSink>>) {
    for sink in sinks {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let fut = sink.deliver(&ev);
                        if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                        {
                            error!(
                                sink = sink.name(),
                                panic = %panic_message(panic.as_ref()),
                                "event sink panicked; event dropped for this sink"
                            );
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        error!(sink = sink.name(), missed, "event sink lagged");
                        continue;
                    }
                }
            }
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Adapts a [`LifecycleListener`] to the sink interface.
pub(crate) struct ListenerSink {
    listener: Arc<dyn LifecycleListener>,
}

impl ListenerSink {
    pub(crate) fn new(listener: Arc<dyn LifecycleListener>) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl EventSink for ListenerSink {
    async fn deliver(&self, ev: &Event) {
        let Some(state) = ev.state else { return };
        match state {
            LifecycleState::Stopped => self.listener.on_stopped().await,
            LifecycleState::Starting => self.listener.on_starting().await,
            LifecycleState::Running => self.listener.on_running().await,
            LifecycleState::Exiting => self.listener.on_exiting().await,
            LifecycleState::Stopping => self.listener.on_stopping().await,
            LifecycleState::Updating => self.listener.on_updating().await,
            LifecycleState::Updated => self.listener.on_updated().await,
            LifecycleState::UpdateFailed => self.listener.on_update_failed().await,
            LifecycleState::Unrecoverable => self.listener.on_unrecoverable().await,
            LifecycleState::Crashed => self.listener.on_crashed(ev.code, ev.signal).await,
            LifecycleState::Errored => {
                self.listener
                    .on_error(ev.error.as_deref().unwrap_or("unknown channel error"))
                    .await
            }
        }
    }

    fn name(&self) -> &'static str {
        self.listener.name()
    }
}

/// Adapts a [`Broadcast`] implementation to the sink interface.
pub(crate) struct BroadcastSink {
    broadcaster: Arc<dyn Broadcast>,
}

impl BroadcastSink {
    pub(crate) fn new(broadcaster: Arc<dyn Broadcast>) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn deliver(&self, ev: &Event) {
        match ev.kind {
            EventKind::StateChanged => {
                if let Some(state) = ev.state {
                    self.broadcaster.broadcast_state_change(state).await;
                }
            }
            EventKind::TlsAssembled => {
                if let Some(tls) = &ev.tls {
                    self.broadcaster.broadcast_tls_config(tls).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        self.broadcaster.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::await_condition;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl EventSink for Recorder {
        async fn deliver(&self, ev: &Event) {
            self.seen.lock().unwrap().push(ev.seq);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn sinks_see_events_in_publication_order() {
        let bus = Bus::new(64);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        spawn_sinks(&bus, vec![recorder.clone()]);

        let seqs: Vec<u64> = (0..5)
            .map(|_| {
                let ev = Event::state_changed(LifecycleState::Starting);
                let seq = ev.seq;
                bus.publish(ev);
                seq
            })
            .collect();

        await_condition(Duration::from_secs(2), || async {
            recorder.seen.lock().unwrap().len() == seqs.len()
        })
        .await
        .expect("all events delivered");
        assert_eq!(*recorder.seen.lock().unwrap(), seqs);
    }

    struct Panicker;

    #[async_trait]
    impl EventSink for Panicker {
        async fn deliver(&self, _ev: &Event) {
            panic!("observer bug");
        }
        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    #[tokio::test]
    async fn a_panicking_sink_does_not_stop_delivery() {
        let bus = Bus::new(64);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        spawn_sinks(&bus, vec![Arc::new(Panicker), recorder.clone()]);

        bus.publish(Event::state_changed(LifecycleState::Starting));
        bus.publish(Event::state_changed(LifecycleState::Running));

        await_condition(Duration::from_secs(2), || async {
            recorder.seen.lock().unwrap().len() == 2
        })
        .await
        .expect("recorder still sees both events");
    }
}
