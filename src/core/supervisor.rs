//! # Supervisor core.
//!
//! [`Core`] owns the daemon attachment: the lifecycle state machine, the
//! child channel, the harvested TLS bundle, the retry accounting, and the
//! log sink. The public [`Supervisor`] handle is a thin `Arc` wrapper so the
//! event pump and callers share one core.
//!
//! ## Rules
//! - Every lifecycle operation (`start`, `stop`, `kill`, `restart`,
//!   `expect_update`, `inject_fault`) holds the op guard for its whole
//!   duration; at most one is ever in flight.
//! - Channel event handlers never take the op guard; they serialize on the
//!   state lock per step and run on the pump task.
//! - The state lock is never held across an `.await`.
//! - Internal state updates strictly precede event publication, and both
//!   precede any listener or broadcast delivery.
//! - The pid is persisted before every reset; reset runs before the
//!   terminal transition so the child/TLS invariants hold whenever an
//!   observer looks.

use std::io;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DaemonConfig;
use crate::error::SupervisorError;
use crate::events::{Bus, Event};
use crate::faults::FaultTracker;
use crate::messages::{decode_frame, NodeMessage, NodeRequest};
use crate::os::{DaemonChannel, LogSink, OsAdapter};
use crate::state::LifecycleState;
use crate::store::PidStore;
use crate::tls::{load_tls_config, TlsConfig};
use crate::wait::await_condition;
use crate::Status;

use super::pump;

/// Mutable supervisor state; guarded by a short non-async lock.
pub(crate) struct Inner {
    pub(crate) state: LifecycleState,
    pub(crate) config: Option<DaemonConfig>,
    pub(crate) channel: Option<Arc<dyn DaemonChannel>>,
    pub(crate) tls: Option<TlsConfig>,
    pub(crate) status: Option<Status>,
    pub(crate) startup_tries: u32,
    pub(crate) connected: bool,
    pub(crate) log_sink: Option<LogSink>,
    pub(crate) pump_token: Option<CancellationToken>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: LifecycleState::Stopped,
            config: None,
            channel: None,
            tls: None,
            status: None,
            startup_tries: 0,
            connected: false,
            log_sink: None,
            pump_token: None,
        }
    }
}

/// Shared supervisor core; one per supervised daemon.
pub(crate) struct Core {
    pub(crate) os: Arc<dyn OsAdapter>,
    pub(crate) store: Arc<dyn PidStore>,
    pub(crate) faults: Arc<FaultTracker>,
    pub(crate) bus: Bus,
    pub(crate) inner: Mutex<Inner>,
    /// Serializes lifecycle operations; never taken by event handlers.
    op_guard: tokio::sync::Mutex<()>,
    /// Self-handle for spawning pump tasks; set once by the builder.
    pub(super) weak: OnceLock<Weak<Core>>,
}

impl Core {
    pub(crate) fn new(
        os: Arc<dyn OsAdapter>,
        store: Arc<dyn PidStore>,
        faults: Arc<FaultTracker>,
        bus: Bus,
    ) -> Self {
        Self {
            os,
            store,
            faults,
            bus,
            inner: Mutex::new(Inner::new()),
            op_guard: tokio::sync::Mutex::new(()),
            weak: OnceLock::new(),
        }
    }

    // ---------------------------
    // Lifecycle operations
    // ---------------------------

    pub(crate) async fn start(
        &self,
        config: DaemonConfig,
        forced: bool,
    ) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        self.start_locked(config, forced).await
    }

    async fn start_locked(
        &self,
        config: DaemonConfig,
        forced: bool,
    ) -> Result<(), SupervisorError> {
        {
            let inner = self.inner.lock();
            if inner.channel.is_some() || !inner.state.permits_start(forced) {
                return Err(SupervisorError::AlreadyRunning);
            }
        }

        self.reap_orphan(&config).await?;

        {
            let inner = self.inner.lock();
            if !forced && inner.startup_tries >= config.startup_max_retries {
                return Err(SupervisorError::TooManyRetries {
                    tries: inner.startup_tries,
                    max: config.startup_max_retries,
                });
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.startup_tries += 1;
            inner.config = Some(config.clone());
            inner.connected = false;
        }
        self.apply_state(LifecycleState::Starting);

        let log = match self.os.open_log(&config.log_file_path).await {
            Ok(log) => log,
            Err(error) => return Err(self.fail_errored(error)),
        };
        let spawned = match self.os.spawn_daemon(&config, &log).await {
            Ok(spawned) => spawned,
            Err(error) => return Err(self.fail_errored(error)),
        };

        let token = CancellationToken::new();
        let pid = spawned.channel.pid();
        {
            let mut inner = self.inner.lock();
            inner.log_sink = Some(log);
            inner.channel = Some(Arc::from(spawned.channel));
            inner.pump_token = Some(token.clone());
        }
        pump::spawn(
            self.weak.get().cloned().unwrap_or_default(),
            spawned.events,
            token,
        );
        debug!(pid, "daemon spawned; waiting for ipc connection");

        let connected = await_condition(config.startup_timeout, || async {
            self.inner.lock().connected
        })
        .await;
        if connected.is_err() {
            // The exit or error handler moves the state machine forward when
            // the child terminates.
            return Err(SupervisorError::SpawnTimeout {
                timeout: config.startup_timeout,
            });
        }

        self.send_frame(&NodeRequest::query_port()).await?;
        Ok(())
    }

    pub(crate) async fn stop(&self) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> Result<(), SupervisorError> {
        let Some(channel) = self.channel() else {
            return Ok(());
        };
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;
        let pid = channel.pid();
        let name = config.node_name();

        self.apply_state(LifecycleState::Stopping);
        channel.disconnect().await;
        drop(channel);
        info!(pid, "ipc channel disconnected; waiting for daemon to stop");

        let died = await_condition(config.shutdown_timeout, || async {
            self.channel().is_none() || !self.os.alive(pid, &name).await
        })
        .await;

        match died {
            Ok(()) => {
                self.persist_and_reset().await;
                self.apply_state(LifecycleState::Stopped);
                Ok(())
            }
            Err(_) => {
                debug!(
                    timeout = ?config.shutdown_timeout,
                    "cooperative stop timed out; escalating to kill"
                );
                self.kill_locked().await
            }
        }
    }

    pub(crate) async fn kill(&self) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        self.kill_locked().await
    }

    async fn kill_locked(&self) -> Result<(), SupervisorError> {
        let Some(channel) = self.channel() else {
            return Ok(());
        };
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;
        let pid = channel.pid();
        let name = config.node_name();
        drop(channel);

        if let Err(error) = self.kill_pid(pid).await {
            error!(%error, pid, "kill delivery failed");
        }
        let confirmed = await_condition(config.kill_timeout, || async {
            self.channel().is_none() || !self.os.alive(pid, &name).await
        })
        .await
        .is_ok();

        self.persist_and_reset().await;
        if confirmed {
            self.apply_state(LifecycleState::Stopped);
            Ok(())
        } else {
            error!(pid, "daemon survived kill confirmation window");
            // The attachment is gone, so no exit event will arrive; land in
            // a resting state that admits a restart.
            self.apply_state(LifecycleState::Crashed);
            Err(SupervisorError::KillFailed { pid })
        }
    }

    pub(crate) async fn restart(
        &self,
        forced: bool,
    ) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;
        let result = self.restart_locked(config, forced).await;
        if let Err(error) = &result {
            self.apply_errored(format!("restart failed: {error}"));
        }
        result
    }

    async fn restart_locked(
        &self,
        config: DaemonConfig,
        forced: bool,
    ) -> Result<(), SupervisorError> {
        if self.channel().is_some() {
            self.stop_locked().await?;
        }
        self.start_locked(config, forced).await
    }

    pub(crate) async fn expect_update(&self) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        let channel = self.channel().ok_or(SupervisorError::NotRunning)?;
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;
        // UPDATING is reachable from RUNNING only; a connecting or
        // stopping daemon cannot self-update.
        if self.state() != LifecycleState::Running {
            return Err(SupervisorError::NotRunning);
        }
        let pid = channel.pid();
        let name = config.node_name();
        drop(channel);

        self.apply_state(LifecycleState::Updating);

        let updated = await_condition(config.update_timeout, || async {
            self.state() == LifecycleState::Updated
        })
        .await;
        if updated.is_err() {
            return Err(self.fail_update(&config).await);
        }

        // The exit event arrived; confirm the process itself is gone.
        let gone = await_condition(config.update_timeout, || async {
            !self.os.alive(pid, &name).await
        })
        .await;
        if gone.is_err() {
            return Err(self.fail_update(&config).await);
        }
        info!(pid, "daemon exited for self-update");
        Ok(())
    }

    async fn fail_update(&self, config: &DaemonConfig) -> SupervisorError {
        if let Err(error) = self.kill_locked().await {
            error!(error = %error, "kill after update timeout failed");
        }
        self.apply_state(LifecycleState::UpdateFailed);
        SupervisorError::UpdateTimeout {
            timeout: config.update_timeout,
        }
    }

    pub(crate) async fn inject_fault(
        &self,
        fault: &str,
        enable: bool,
    ) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        let Some(channel) = self.channel() else {
            return Ok(());
        };
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;

        channel
            .send(&NodeRequest::set_fault(fault, enable))
            .await?;
        drop(channel);
        info!(fault, enable, "fault injection requested; awaiting confirmation");

        await_condition(config.fault_timeout(), || async {
            self.faults.matches(fault, enable).await
        })
        .await
        .map_err(|_| SupervisorError::FaultTimeout {
            fault: fault.to_string(),
        })
    }

    // ---------------------------
    // Channel event handlers (pump task only)
    // ---------------------------

    pub(crate) fn mark_connected(&self) {
        debug!("daemon ipc channel connected");
        self.inner.lock().connected = true;
    }

    pub(crate) async fn handle_message(&self, frame: Value) {
        match decode_frame(&frame) {
            Some(NodeMessage::ReplyPort(port)) => self.handle_reply_port(port).await,
            Some(NodeMessage::FInjects(faults)) => {
                info!(?faults, "daemon reported active fault injections");
                self.faults.replace(faults).await;
            }
            Some(NodeMessage::Started(_)) => debug!("daemon reported started"),
            None => debug!(%frame, "ignoring unrecognized daemon frame"),
        }
    }

    async fn handle_reply_port(&self, port: u16) {
        let Some(config) = self.config() else { return };
        let tls = match load_tls_config(self.os.as_ref(), &config, port).await {
            Ok(tls) => tls,
            Err(error) => {
                self.handle_channel_error(format!("tls assembly failed: {error}"))
                    .await;
                return;
            }
        };

        let entered_running = {
            let mut inner = self.inner.lock();
            let starting = inner.state == LifecycleState::Starting;
            if starting || inner.state.holds_tls() {
                inner.tls = Some(tls.clone());
            }
            if starting {
                inner.startup_tries = 0;
            }
            starting
        };

        if entered_running {
            info!(port, "tls config assembled; daemon running");
            self.apply_state(LifecycleState::Running);
            self.bus.publish(Event::tls_assembled(tls));
        }
    }

    pub(crate) async fn handle_exit(&self, code: Option<i32>, signal: Option<i32>) {
        let (config, pid) = {
            let inner = self.inner.lock();
            let (Some(channel), Some(config)) = (&inner.channel, &inner.config) else {
                // Already torn down by an operation; nothing left to account.
                return;
            };
            (config.clone(), channel.pid())
        };
        info!(pid, ?code, ?signal, "daemon exit observed");

        if self.state() == LifecycleState::Running {
            self.apply_state(LifecycleState::Exiting);
        }

        let name = config.node_name();
        let gone = await_condition(config.shutdown_timeout, || async {
            !self.os.alive(pid, &name).await
        })
        .await;
        if gone.is_err() {
            // Probe still sees the process; force it and continue regardless.
            if let Err(error) = self.kill_pid(pid).await {
                error!(%error, pid, "post-exit kill failed");
            }
        }

        self.persist_and_reset().await;

        let next = {
            let inner = self.inner.lock();
            match inner.state {
                LifecycleState::Stopping => Some(LifecycleState::Stopped),
                LifecycleState::Updating if code == Some(20) => Some(LifecycleState::Updated),
                // An operation already applied a resting state; keep it.
                LifecycleState::Stopped
                | LifecycleState::Crashed
                | LifecycleState::Errored
                | LifecycleState::Unrecoverable
                | LifecycleState::Updated
                | LifecycleState::UpdateFailed => None,
                _ if inner.startup_tries >= config.startup_max_retries => {
                    Some(LifecycleState::Unrecoverable)
                }
                _ => Some(LifecycleState::Crashed),
            }
        };
        match next {
            Some(LifecycleState::Crashed) => {
                self.apply_with(LifecycleState::Crashed, code, signal, None)
            }
            Some(state) => self.apply_state(state),
            None => {}
        }
    }

    pub(crate) async fn handle_channel_error(&self, message: String) {
        error!(error = %message, "daemon channel error");
        self.persist_and_reset().await;
        self.apply_errored(message);
        if let Err(error) = self.restart_after_error().await {
            error!(
                error = %error,
                label = error.as_label(),
                "automatic restart after channel error failed"
            );
        }
    }

    async fn restart_after_error(&self) -> Result<(), SupervisorError> {
        let _op = self.op_guard.lock().await;
        let config = self.config().ok_or(SupervisorError::NotConfigured)?;
        self.restart_locked(config, false).await
    }

    // ---------------------------
    // Transitions & bookkeeping
    // ---------------------------

    /// Applies a transition: state update first, then one event, in order.
    ///
    /// Same-state transitions are suppressed, which makes duplicate
    /// `ReplyPort` frames and racing teardown paths idempotent.
    pub(crate) fn apply_state(&self, next: LifecycleState) {
        self.apply_with(next, None, None, None);
    }

    fn apply_with(
        &self,
        next: LifecycleState,
        code: Option<i32>,
        signal: Option<i32>,
        error: Option<String>,
    ) {
        let inner = &mut *self.inner.lock();
        if inner.state == next {
            return;
        }
        inner.state = next;
        info!(state = next.as_label(), "lifecycle transition");
        let mut ev = Event::state_changed(next).with_exit(code, signal);
        if let Some(message) = error {
            ev = ev.with_error(message);
        }
        // Published under the state lock so sequence numbers match
        // transition order.
        self.bus.publish(ev);
    }

    fn apply_errored(&self, message: String) {
        self.apply_with(LifecycleState::Errored, None, None, Some(message));
    }

    fn fail_errored(&self, error: io::Error) -> SupervisorError {
        self.apply_errored(error.to_string());
        SupervisorError::Io(error)
    }

    /// Writes the current pid, then resets; the pid record must land
    /// before the attachment is torn down so a crash between the two never
    /// loses track of a live daemon.
    pub(crate) async fn persist_and_reset(&self) {
        let (pid, key) = {
            let inner = self.inner.lock();
            (
                inner.channel.as_ref().map(|c| c.pid()),
                inner.config.as_ref().map(|c| c.pid_key()),
            )
        };
        if let (Some(pid), Some(key)) = (pid, key) {
            if let Err(error) = self.store.set(&key, pid).await {
                error!(%error, pid, "failed to persist daemon pid");
            }
        }
        self.reset().await;
    }

    /// Clears the attachment: cancels the pump, disconnects the channel,
    /// closes the log sink, drops the TLS bundle and fault set.
    async fn reset(&self) {
        let (channel, log_sink, token) = {
            let mut inner = self.inner.lock();
            inner.connected = false;
            inner.tls = None;
            (
                inner.channel.take(),
                inner.log_sink.take(),
                inner.pump_token.take(),
            )
        };
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(channel) = channel {
            channel.disconnect().await;
        }
        drop(log_sink);
        self.faults.clear().await;
    }

    pub(super) async fn kill_pid(&self, pid: u32) -> io::Result<()> {
        if cfg!(windows) {
            self.os
                .exec(
                    "taskkill",
                    &["/pid".into(), pid.to_string(), "/t".into(), "/f".into()],
                )
                .await
        } else {
            self.os.terminate(pid).await
        }
    }

    async fn send_frame(&self, frame: &NodeRequest) -> Result<(), SupervisorError> {
        let channel = self.channel().ok_or(SupervisorError::NotRunning)?;
        channel.send(frame).await?;
        Ok(())
    }

    // ---------------------------
    // Accessors
    // ---------------------------

    pub(crate) fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub(crate) fn channel(&self) -> Option<Arc<dyn DaemonChannel>> {
        self.inner.lock().channel.clone()
    }

    pub(crate) fn config(&self) -> Option<DaemonConfig> {
        self.inner.lock().config.clone()
    }
}

/// Supervisor for one long-running daemon process.
///
/// Cloning is cheap and clones share the same core; construct via
/// [`SupervisorBuilder`](crate::SupervisorBuilder).
#[derive(Clone)]
pub struct Supervisor {
    core: Arc<Core>,
}

impl Supervisor {
    pub(crate) fn from_core(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Starts the daemon with `config`.
    ///
    /// Preconditions, in order: no attached child and a state that admits
    /// starting (`AlreadyRunning`), a reapable-or-absent orphan
    /// (`OrphanReapFailed`), and an unexhausted retry budget unless
    /// `forced` (`TooManyRetries`). On success the state is `Starting`; the
    /// `Running` transition follows once the daemon announces its port and
    /// the TLS bundle is assembled.
    pub async fn start(
        &self,
        config: DaemonConfig,
        forced: bool,
    ) -> Result<(), SupervisorError> {
        self.core.start(config, forced).await
    }

    /// Stops the daemon cooperatively, escalating to [`kill`](Self::kill)
    /// when the shutdown budget expires. A no-op success without a child.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.core.stop().await
    }

    /// Kills the daemon and confirms its death within the kill budget.
    /// A no-op success without a child. When the process survives the
    /// confirmation window the attachment is still torn down, the state
    /// lands in `Crashed`, and `KillFailed` is returned.
    pub async fn kill(&self) -> Result<(), SupervisorError> {
        self.core.kill().await
    }

    /// Stops (if attached) and starts again with the previous config.
    ///
    /// Any failure transitions to `Errored` and is surfaced.
    pub async fn restart(&self, forced: bool) -> Result<(), SupervisorError> {
        self.core.restart(forced).await
    }

    /// Waits for the daemon to exit with the self-update code (20), then
    /// for the process to actually die. Either budget expiring kills the
    /// daemon, transitions to `UpdateFailed`, and returns `UpdateTimeout`.
    ///
    /// Admitted from `Running` only; returns `NotRunning` otherwise.
    pub async fn expect_update(&self) -> Result<(), SupervisorError> {
        self.core.expect_update().await
    }

    /// Requests a fault-injection change and waits for the daemon to
    /// confirm it. A no-op success without a child.
    pub async fn inject_fault(&self, fault: &str, enable: bool) -> Result<(), SupervisorError> {
        self.core.inject_fault(fault, enable).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.core.state()
    }

    /// Cached status value, if any.
    pub fn status(&self) -> Option<Status> {
        self.core.inner.lock().status.clone()
    }

    /// Caches `status` on behalf of callers; never interpreted.
    pub fn save_status(&self, status: Status) {
        self.core.inner.lock().status = Some(status);
    }

    /// Pid of the attached daemon, if any.
    pub fn pid(&self) -> Option<u32> {
        self.core.inner.lock().channel.as_ref().map(|c| c.pid())
    }

    /// Startup attempts consumed since the last successful `Running` entry.
    pub fn startup_tries(&self) -> u32 {
        self.core.inner.lock().startup_tries
    }

    /// Clone of the harvested TLS bundle, if the daemon is serving.
    pub fn tls_config(&self) -> Option<TlsConfig> {
        self.core.inner.lock().tls.clone()
    }

    /// Sorted snapshot of daemon-confirmed fault injections.
    pub async fn active_faults(&self) -> Vec<String> {
        self.core.faults.snapshot().await
    }

    /// Receiver of every supervisor event published after this call.
    ///
    /// Useful for tests and ad-hoc observers; long-lived integrations
    /// should prefer [`LifecycleListener`](crate::LifecycleListener) and
    /// [`Broadcast`](crate::Broadcast).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.core.bus.subscribe()
    }
}
