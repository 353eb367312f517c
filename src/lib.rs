//! # nodevisor
//!
//! **Nodevisor** is a lifecycle supervisor for a long-running blockchain
//! node daemon. It owns the daemon end-to-end: spawning with a configured
//! argument vector and an append-only log sink, structured messaging over
//! an IPC channel, an explicit eleven-state lifecycle machine, harvesting
//! the TLS configuration the daemon emits at startup, persisting the child
//! pid across supervisor restarts, and reaping orphans left behind by
//! abnormal supervisor termination.
//!
//! ## Features
//!
//! | Area              | Description                                                    | Key types / traits                       |
//! |-------------------|----------------------------------------------------------------|------------------------------------------|
//! | **Lifecycle**     | Eleven-state machine with per-state listener callbacks.        | [`LifecycleState`], [`LifecycleListener`]|
//! | **Operations**    | Start/stop/kill/restart/update/fault-injection, all bounded.   | [`Supervisor`]                           |
//! | **Broadcast**     | State changes and the TLS bundle forwarded to an observer.     | [`Broadcast`], [`TlsConfig`]             |
//! | **OS seam**       | Spawn, exec, file read, log open, alive probe — all injected.  | [`OsAdapter`], [`SystemOs`]              |
//! | **Persistence**   | Last daemon pid, keyed by network, for orphan reaping.         | [`PidStore`], [`JsonFileStore`]          |
//! | **Errors**        | Typed operation failures with stable labels.                   | [`SupervisorError`]                      |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nodevisor::{DaemonConfig, JsonFileStore, SupervisorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = SupervisorBuilder::new()
//!         .with_store(Arc::new(JsonFileStore::new("pids.json")))
//!         .build();
//!
//!     let config = DaemonConfig::new("/usr/local/bin/cardano-node", "mainnet")
//!         .with_args(["run", "--config", "mainnet-config.json"])
//!         .with_log_file("node.log")
//!         .with_tls_path("tls")
//!         .with_timeouts(
//!             Duration::from_secs(60),
//!             Duration::from_secs(60),
//!             Duration::from_secs(15),
//!             Duration::from_secs(120),
//!         )
//!         .with_max_retries(3);
//!
//!     supervisor.start(config, false).await?;
//!     // ... daemon transitions to Running once it announces its port ...
//!     supervisor.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! A single supervisor instance manages at most one daemon. The supervisor
//! does not interpret daemon application data or the TLS certificates it
//! forwards, does not schedule work for the daemon, and does not multiplex
//! multiple daemons.

mod broadcast;
mod config;
mod core;
mod error;
mod events;
mod faults;
mod listener;
mod messages;
mod os;
mod state;
mod store;
mod tls;
mod wait;

// ---- Public re-exports ----

pub use broadcast::{Broadcast, NullBroadcast};
pub use config::DaemonConfig;
pub use crate::core::{Supervisor, SupervisorBuilder};
pub use error::SupervisorError;
pub use events::{Bus, Event, EventKind, EventSink};
pub use faults::FaultTracker;
pub use listener::{LifecycleListener, NullListener};
pub use messages::{decode_frame, ChildEvent, NodeMessage, NodeRequest};
pub use os::{DaemonChannel, LogSink, OsAdapter, SpawnedDaemon, SystemOs};
pub use state::LifecycleState;
pub use store::{JsonFileStore, MemoryStore, PidStore};
pub use tls::TlsConfig;
pub use wait::await_condition;

/// Opaque status value cached on behalf of callers; never interpreted.
pub type Status = serde_json::Value;
