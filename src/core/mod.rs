//! Supervisor core: operations, event pump, orphan reaping.
//!
//! The only public API re-exported from here is [`Supervisor`] and its
//! builder. Everything else is an internal building block the builder wires
//! together.
//!
//! ## Files & responsibilities
//! - **supervisor.rs**: the core — op-guarded lifecycle operations (`start`,
//!   `stop`, `kill`, `restart`, `expect_update`, `inject_fault`), channel
//!   event handlers, transition mechanics, persist-then-reset, getters; plus
//!   the public `Supervisor` handle.
//! - **pump.rs**: per-attachment task that drains channel events and drives
//!   the handlers, detached via `CancellationToken` on reset.
//! - **reaper.rs**: kills a daemon left behind by a previous supervisor run
//!   before a new one is spawned.
//! - **builder.rs**: wires OS adapter, pid store, bus, and dispatch workers.
//!
//! ## Wiring (module-level flow)
//! ```text
//! caller ──► Supervisor::start(config)
//!               ├─ reap orphan (PidStore + alive probe + kill)
//!               ├─ transition STARTING ──► Bus ──► listener / broadcaster
//!               ├─ OsAdapter::open_log ──► OsAdapter::spawn_daemon
//!               ├─ pump::spawn(events)
//!               ├─ bounded wait: channel connected
//!               └─ send {QueryPort: []}
//!
//! pump ──► Connected        → mark connected
//!      ├─► Message(frame)   → ReplyPort → read TLS files → RUNNING
//!      │                      FInjects → FaultTracker::replace
//!      │                      other    → log, ignore
//!      ├─► Exit(code, sig)  → death-confirm wait → persist + reset
//!      │                      → STOPPED | UPDATED | UNRECOVERABLE | CRASHED
//!      └─► Error(e)         → persist + reset → ERRORED → restart()
//! ```
//!
//! ## Shutdown timeline
//! ```text
//! stop() → STOPPING → disconnect ipc → bounded wait for death
//!        → dead: persist pid, reset, STOPPED
//!        → timeout: kill() → signal/taskkill → bounded confirm
//!                 → dead: persist, reset, STOPPED
//!                 → alive: persist, reset, CRASHED, Err(KillFailed)
//! ```

mod builder;
mod pump;
mod reaper;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use supervisor::Supervisor;
