//! # Daemon lifecycle states.
//!
//! [`LifecycleState`] is the closed set of states the supervisor drives the
//! daemon through. The admissible transitions:
//!
//! ```text
//! STOPPED        → STARTING                     (start, preconditions met)
//! STARTING       → RUNNING                      (TLS assembled)
//! STARTING       → ERRORED | CRASHED | UNRECOVERABLE
//! RUNNING        → EXITING                      (child exit observed)
//! RUNNING        → STOPPING                     (stop requested)
//! RUNNING        → UPDATING                     (expect_update)
//! EXITING        → STOPPED | CRASHED | UPDATED | UNRECOVERABLE
//! STOPPING       → STOPPED                      (process confirmed dead)
//! STOPPING       → CRASHED                      (fallback after kill)
//! UPDATING       → UPDATED                      (exit code == 20)
//! UPDATING       → UPDATE_FAILED                (update timeout)
//! CRASHED | UPDATED | STOPPED | ERRORED → STARTING   (restart)
//! UNRECOVERABLE | UPDATE_FAILED → STARTING      (restart(forced) only)
//! ```
//!
//! ## Rules
//! - `Unrecoverable` and `UpdateFailed` are terminal until a forced restart.
//! - States in [`holds_child`](LifecycleState::holds_child) are the only ones
//!   in which a child handle may be attached.
//! - States in [`holds_tls`](LifecycleState::holds_tls) are the only ones in
//!   which a harvested TLS config may be cached.

/// Lifecycle state of the supervised daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No daemon attached; the initial state.
    Stopped,
    /// Spawn issued, waiting for the IPC channel and the TLS handshake.
    Starting,
    /// Daemon connected and TLS config assembled.
    Running,
    /// Child exit observed from RUNNING; classification pending.
    Exiting,
    /// Cooperative shutdown in progress.
    Stopping,
    /// Waiting for the daemon to exit with the self-update code.
    Updating,
    /// Daemon exited with the self-update code (20).
    Updated,
    /// Daemon died outside a stop or update path.
    Crashed,
    /// The IPC channel reported an error.
    Errored,
    /// Startup retries exhausted; only a forced restart leaves this state.
    Unrecoverable,
    /// Update wait expired; only a forced restart leaves this state.
    UpdateFailed,
}

impl LifecycleState {
    /// Short stable label (snake_case) for logs and broadcasts.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Exiting => "exiting",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Updating => "updating",
            LifecycleState::Updated => "updated",
            LifecycleState::Crashed => "crashed",
            LifecycleState::Errored => "errored",
            LifecycleState::Unrecoverable => "unrecoverable",
            LifecycleState::UpdateFailed => "update_failed",
        }
    }

    /// Whether `start` may enter `Starting` from this state.
    ///
    /// `Unrecoverable` passes this gate unforced but is then stopped by the
    /// retry budget, which can only be exhausted there; `UpdateFailed`
    /// requires `forced` outright.
    pub fn permits_start(&self, forced: bool) -> bool {
        match self {
            LifecycleState::Stopped
            | LifecycleState::Crashed
            | LifecycleState::Updated
            | LifecycleState::Errored
            | LifecycleState::Unrecoverable => true,
            LifecycleState::UpdateFailed => forced,
            _ => false,
        }
    }

    /// States in which a child handle may be attached.
    pub fn holds_child(&self) -> bool {
        matches!(
            self,
            LifecycleState::Starting
                | LifecycleState::Running
                | LifecycleState::Exiting
                | LifecycleState::Stopping
                | LifecycleState::Updating
                | LifecycleState::Updated
        )
    }

    /// States in which a harvested TLS config may be cached.
    pub fn holds_tls(&self) -> bool {
        matches!(
            self,
            LifecycleState::Running
                | LifecycleState::Exiting
                | LifecycleState::Stopping
                | LifecycleState::Updating
                | LifecycleState::Updated
        )
    }
}

impl Default for LifecycleState {
    /// Returns [`LifecycleState::Stopped`].
    fn default() -> Self {
        LifecycleState::Stopped
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}
