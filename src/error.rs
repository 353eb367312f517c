//! # Error types for supervisor operations.
//!
//! [`SupervisorError`] covers every failure a public lifecycle operation can
//! surface. The supervisor recovers locally only from a stop timeout (by
//! escalating to kill); everything else is reported to the caller and, where
//! applicable, reflected by a transition to `Errored`.
//!
//! `as_label` provides short stable labels for logs and metrics.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by supervisor lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// `start` was called while a daemon is attached or the state does not
    /// admit a (re)start.
    #[error("daemon is already running or a lifecycle operation is incomplete")]
    AlreadyRunning,

    /// An orphaned daemon from a previous run could not be reaped.
    #[error("failed to reap orphaned daemon with pid {pid}")]
    OrphanReapFailed {
        /// Pid of the surviving orphan.
        pid: u32,
    },

    /// Startup retry budget exhausted; pass `forced` to override.
    #[error("startup retries exhausted ({tries}/{max})")]
    TooManyRetries {
        /// Retries consumed so far.
        tries: u32,
        /// Configured retry budget.
        max: u32,
    },

    /// The IPC channel did not report connected within the startup timeout.
    #[error("daemon did not connect within {timeout:?}")]
    SpawnTimeout {
        /// The configured startup timeout.
        timeout: Duration,
    },

    /// Cooperative shutdown did not finish within the shutdown timeout.
    ///
    /// Recovered internally by escalating to `kill`; callers observe the
    /// kill outcome instead.
    #[error("daemon did not stop within {timeout:?}")]
    StopTimeout {
        /// The configured shutdown timeout.
        timeout: Duration,
    },

    /// The process survived the kill confirmation window.
    #[error("daemon with pid {pid} survived kill")]
    KillFailed {
        /// Pid of the surviving process.
        pid: u32,
    },

    /// The daemon did not complete its self-update in time.
    #[error("daemon update did not complete within {timeout:?}")]
    UpdateTimeout {
        /// The configured update timeout.
        timeout: Duration,
    },

    /// The daemon did not acknowledge a fault-injection change in time.
    #[error("daemon did not confirm fault injection '{fault}'")]
    FaultTimeout {
        /// The fault identifier that went unacknowledged.
        fault: String,
    },

    /// `restart` was called before any `start` recorded a configuration.
    #[error("no daemon configuration recorded; call start first")]
    NotConfigured,

    /// The operation requires an attached daemon.
    #[error("no daemon attached")]
    NotRunning,

    /// Filesystem or spawn adapter failure.
    #[error("os adapter failure: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyRunning => "already_running",
            SupervisorError::OrphanReapFailed { .. } => "orphan_reap_failed",
            SupervisorError::TooManyRetries { .. } => "too_many_retries",
            SupervisorError::SpawnTimeout { .. } => "spawn_timeout",
            SupervisorError::StopTimeout { .. } => "stop_timeout",
            SupervisorError::KillFailed { .. } => "kill_failed",
            SupervisorError::UpdateTimeout { .. } => "update_timeout",
            SupervisorError::FaultTimeout { .. } => "fault_timeout",
            SupervisorError::NotConfigured => "not_configured",
            SupervisorError::NotRunning => "not_running",
            SupervisorError::Io(_) => "internal_io",
        }
    }

    /// Whether the failure came from a precondition check (no state change
    /// was made on its behalf).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SupervisorError::AlreadyRunning
                | SupervisorError::TooManyRetries { .. }
                | SupervisorError::OrphanReapFailed { .. }
                | SupervisorError::NotConfigured
                | SupervisorError::NotRunning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(SupervisorError::AlreadyRunning.as_label(), "already_running");
        assert_eq!(
            SupervisorError::KillFailed { pid: 7 }.as_label(),
            "kill_failed"
        );
        let io: SupervisorError = std::io::Error::other("boom").into();
        assert_eq!(io.as_label(), "internal_io");
    }

    #[test]
    fn precondition_classification() {
        assert!(SupervisorError::AlreadyRunning.is_precondition());
        assert!(SupervisorError::TooManyRetries { tries: 3, max: 3 }.is_precondition());
        assert!(!SupervisorError::SpawnTimeout {
            timeout: Duration::from_secs(1)
        }
        .is_precondition());
    }
}
