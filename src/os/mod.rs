//! Operating-system seam.
//!
//! Everything the supervisor needs from the OS goes through [`OsAdapter`]:
//! spawning the daemon with its IPC channel, running commands, reading
//! files, opening the append-only log sink, probing whether a `(pid, name)`
//! pair is alive, and delivering the default termination signal. The trait
//! is injected so tests can script every interaction.
//!
//! [`SystemOs`] is the production implementation.

mod system;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::DaemonConfig;
use crate::messages::{ChildEvent, NodeRequest};

pub use system::SystemOs;

/// Append-only log sink handed to the spawned daemon.
///
/// The supervisor holds the sink for the lifetime of one daemon attachment
/// and drops it on every reset, releasing the underlying file handle.
#[derive(Debug)]
pub struct LogSink {
    file: std::fs::File,
}

impl LogSink {
    /// Wraps an already opened append-mode file.
    pub fn new(file: std::fs::File) -> Self {
        Self { file }
    }

    /// Duplicates the underlying handle for stdio redirection.
    pub fn try_clone(&self) -> io::Result<std::fs::File> {
        self.file.try_clone()
    }
}

/// Write side of the daemon's IPC channel plus its identity.
#[async_trait]
pub trait DaemonChannel: Send + Sync {
    /// Pid of the spawned daemon.
    fn pid(&self) -> u32;

    /// Sends one frame to the daemon.
    async fn send(&self, frame: &NodeRequest) -> io::Result<()>;

    /// Closes the channel — the daemon's cue for cooperative shutdown.
    async fn disconnect(&self);
}

/// A freshly spawned daemon: its channel handle and its event stream.
///
/// The stream yields [`ChildEvent::Connected`] once the channel is wired,
/// then inbound frames, and finally exactly one `Exit` or `Error`.
pub struct SpawnedDaemon {
    /// Write side of the IPC channel.
    pub channel: Box<dyn DaemonChannel>,
    /// Serialized channel events for the supervisor's pump.
    pub events: mpsc::Receiver<ChildEvent>,
}

/// Process and filesystem primitives the supervisor runs on.
#[async_trait]
pub trait OsAdapter: Send + Sync + 'static {
    /// Spawns the daemon with stdio `[inherit, log, log, ipc]` and returns
    /// its channel and event stream.
    async fn spawn_daemon(&self, config: &DaemonConfig, log: &LogSink)
        -> io::Result<SpawnedDaemon>;

    /// Runs a command to completion; non-zero exit is an error.
    async fn exec(&self, program: &str, args: &[String]) -> io::Result<()>;

    /// Reads a file into memory.
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Opens (creating if needed) an append-only log sink.
    async fn open_log(&self, path: &Path) -> io::Result<LogSink>;

    /// Whether a process with `pid` is running under the executable `name`.
    async fn alive(&self, pid: u32, name: &str) -> bool;

    /// Delivers the platform's default termination signal to `pid`.
    async fn terminate(&self, pid: u32) -> io::Result<()>;
}
