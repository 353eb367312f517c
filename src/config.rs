//! # Daemon launch configuration.
//!
//! [`DaemonConfig`] centralizes everything `start` needs: the node binary,
//! its argument vector, the log sink path, the TLS directory, the four
//! timeout budgets, and the startup retry budget.
//!
//! The config is immutable once handed to `start`; the supervisor keeps a
//! clone for `restart`.
//!
//! ## Field semantics
//! - `startup_timeout`: bound on the IPC channel reporting connected
//! - `shutdown_timeout`: bound on cooperative death after `stop`
//! - `kill_timeout`: bound on death confirmation after a kill
//! - `update_timeout`: bound on each phase of `expect_update`
//! - `fault_timeout`: bound on fault-injection acknowledgement;
//!   `None` falls back to `startup_timeout`
//! - `startup_max_retries`: unforced `start` budget (`0` = forced only)

use std::path::PathBuf;
use std::time::Duration;

/// Launch configuration for the supervised daemon.
#[derive(Clone, Debug)]
pub struct DaemonConfig {
    /// Path to the node executable.
    pub node_path: PathBuf,
    /// Append-only log sink for daemon stdout/stderr.
    pub log_file_path: PathBuf,
    /// Directory holding `client/ca.crt`, `client/client.key`,
    /// `client/client.pem`.
    pub tls_path: PathBuf,
    /// Ordered daemon argument vector.
    pub node_args: Vec<String>,
    /// Target network name; the pid persistence key derives from it.
    pub network: String,
    /// Bound on the IPC channel reporting connected.
    pub startup_timeout: Duration,
    /// Bound on cooperative death after `stop`.
    pub shutdown_timeout: Duration,
    /// Bound on death confirmation after a kill.
    pub kill_timeout: Duration,
    /// Bound on each phase of `expect_update`.
    pub update_timeout: Duration,
    /// Bound on fault-injection acknowledgement (`None` = `startup_timeout`).
    pub fault_timeout: Option<Duration>,
    /// Unforced startup retry budget.
    pub startup_max_retries: u32,
}

impl DaemonConfig {
    /// Creates a config for `node_path` on `network` with default budgets.
    ///
    /// Defaults: 60s startup, 60s shutdown, 15s kill, 120s update,
    /// 3 startup retries.
    pub fn new(node_path: impl Into<PathBuf>, network: impl Into<String>) -> Self {
        Self {
            node_path: node_path.into(),
            log_file_path: PathBuf::from("node.log"),
            tls_path: PathBuf::from("tls"),
            node_args: Vec::new(),
            network: network.into(),
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            kill_timeout: Duration::from_secs(15),
            update_timeout: Duration::from_secs(120),
            fault_timeout: None,
            startup_max_retries: 3,
        }
    }

    /// Sets the daemon argument vector.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the log sink path.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file_path = path.into();
        self
    }

    /// Sets the TLS directory.
    pub fn with_tls_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_path = path.into();
        self
    }

    /// Sets all four lifecycle timeout budgets at once.
    pub fn with_timeouts(
        mut self,
        startup: Duration,
        shutdown: Duration,
        kill: Duration,
        update: Duration,
    ) -> Self {
        self.startup_timeout = startup;
        self.shutdown_timeout = shutdown;
        self.kill_timeout = kill;
        self.update_timeout = update;
        self
    }

    /// Sets the fault-injection acknowledgement budget.
    pub fn with_fault_timeout(mut self, timeout: Duration) -> Self {
        self.fault_timeout = Some(timeout);
        self
    }

    /// Sets the unforced startup retry budget.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.startup_max_retries = max;
        self
    }

    /// Executable name the alive probe matches against.
    ///
    /// Falls back to the full path string when the path has no file stem.
    pub fn node_name(&self) -> String {
        self.node_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.node_path.to_string_lossy().into_owned())
    }

    /// Persistence key for the last observed daemon pid.
    pub fn pid_key(&self) -> String {
        format!("{}-previous-node-pid", self.network)
    }

    /// Effective fault-injection acknowledgement budget.
    pub fn fault_timeout(&self) -> Duration {
        self.fault_timeout.unwrap_or(self.startup_timeout)
    }

    /// Path of one of the three TLS client files.
    pub(crate) fn tls_client_file(&self, file: &str) -> PathBuf {
        self.tls_path.join("client").join(file)
    }
}
