//! Supervisor event plumbing: event type, broadcast bus, sink fan-out.
//!
//! The core publishes to the [`Bus`] and never awaits observers; dedicated
//! workers translate events into [`LifecycleListener`](crate::LifecycleListener)
//! and [`Broadcast`](crate::Broadcast) callbacks.

mod bus;
mod dispatch;
mod event;

pub use bus::Bus;
pub use dispatch::EventSink;
pub use event::{Event, EventKind};

pub(crate) use dispatch::{spawn_sinks, BroadcastSink, ListenerSink};
