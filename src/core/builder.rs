//! # Supervisor builder.
//!
//! Wires the runtime components together: the OS adapter, the pid store,
//! the event bus, and the dispatch workers for the listener and the
//! broadcaster. Every collaborator has a production default, so the
//! smallest build is `SupervisorBuilder::new().build()`.

use std::sync::Arc;

use crate::broadcast::{Broadcast, NullBroadcast};
use crate::events::{spawn_sinks, BroadcastSink, Bus, EventSink, ListenerSink};
use crate::faults::FaultTracker;
use crate::listener::{LifecycleListener, NullListener};
use crate::os::{OsAdapter, SystemOs};
use crate::store::{MemoryStore, PidStore};

use super::supervisor::{Core, Supervisor};

/// Default capacity of the event bus ring buffer.
const BUS_CAPACITY: usize = 256;

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    os: Option<Arc<dyn OsAdapter>>,
    store: Option<Arc<dyn PidStore>>,
    listener: Arc<dyn LifecycleListener>,
    broadcaster: Arc<dyn Broadcast>,
    bus_capacity: usize,
}

impl SupervisorBuilder {
    /// Creates a builder with production defaults: [`SystemOs`],
    /// [`MemoryStore`], and no-op listener/broadcaster.
    pub fn new() -> Self {
        Self {
            os: None,
            store: None,
            listener: Arc::new(NullListener),
            broadcaster: Arc::new(NullBroadcast),
            bus_capacity: BUS_CAPACITY,
        }
    }

    /// Injects the OS adapter (tests script it; production uses
    /// [`SystemOs`]).
    pub fn with_os(mut self, os: Arc<dyn OsAdapter>) -> Self {
        self.os = Some(os);
        self
    }

    /// Injects the pid store (deployments want
    /// [`JsonFileStore`](crate::JsonFileStore)).
    pub fn with_store(mut self, store: Arc<dyn PidStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the lifecycle listener.
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Sets the external broadcaster.
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcast>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Overrides the event bus capacity (min 1).
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Builds the supervisor and spawns its dispatch workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.bus_capacity);
        let sinks: Vec<Arc<dyn EventSink>> = vec![
            Arc::new(ListenerSink::new(self.listener)),
            Arc::new(BroadcastSink::new(self.broadcaster)),
        ];
        spawn_sinks(&bus, sinks);

        let core = Arc::new(Core::new(
            self.os.unwrap_or_else(|| Arc::new(SystemOs::new())),
            self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            Arc::new(FaultTracker::new()),
            bus,
        ));
        let _ = core.weak.set(Arc::downgrade(&core));
        Supervisor::from_core(core)
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
