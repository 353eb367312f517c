//! Shared test doubles: a scripted OS adapter, a scripted daemon, and
//! recording listener/broadcaster implementations.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use nodevisor::{
    Broadcast, ChildEvent, DaemonChannel, DaemonConfig, LifecycleListener, LifecycleState,
    LogSink, NodeRequest, OsAdapter, SpawnedDaemon, TlsConfig,
};

/// One scripted daemon spawn: the test pushes channel events through it and
/// inspects what the supervisor sent.
pub struct DaemonScript {
    pub pid: u32,
    events: mpsc::Sender<ChildEvent>,
    sent: Mutex<Vec<Value>>,
    disconnected: AtomicBool,
}

impl DaemonScript {
    /// Delivers a channel event to the supervisor's pump.
    pub async fn push(&self, ev: ChildEvent) {
        let _ = self.events.send(ev).await;
    }

    /// Frames the supervisor sent over the channel, in order.
    pub fn sent_frames(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether the supervisor disconnected the channel.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

struct StubChannel {
    script: Arc<DaemonScript>,
}

#[async_trait]
impl DaemonChannel for StubChannel {
    fn pid(&self) -> u32 {
        self.script.pid
    }

    async fn send(&self, frame: &NodeRequest) -> io::Result<()> {
        let value = serde_json::to_value(frame).expect("frame serializes");
        self.script.sent.lock().unwrap().push(value);
        Ok(())
    }

    async fn disconnect(&self) {
        self.script.disconnected.store(true, Ordering::SeqCst);
    }
}

struct StubState {
    alive: HashSet<u32>,
    expected_name: Option<String>,
    next_pid: u32,
    die_on_kill: bool,
    connect_on_spawn: bool,
    files: HashMap<PathBuf, Vec<u8>>,
    terminations: Vec<u32>,
    execs: Vec<(String, Vec<String>)>,
    daemons: Vec<Arc<DaemonScript>>,
}

/// Scripted OS adapter: every primitive is controllable and recorded.
pub struct StubOs {
    state: Mutex<StubState>,
}

impl StubOs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StubState {
                alive: HashSet::new(),
                expected_name: None,
                next_pid: 1000,
                die_on_kill: true,
                connect_on_spawn: true,
                files: HashMap::new(),
                terminations: Vec::new(),
                execs: Vec::new(),
                daemons: Vec::new(),
            }),
        })
    }

    /// Seeds the three TLS client files under `tls_path`.
    pub fn seed_tls(&self, tls_path: &Path) {
        let mut state = self.state.lock().unwrap();
        for (name, content) in [
            ("ca.crt", b"stub ca".to_vec()),
            ("client.key", b"stub key".to_vec()),
            ("client.pem", b"stub cert".to_vec()),
        ] {
            state
                .files
                .insert(tls_path.join("client").join(name), content);
        }
    }

    pub fn set_alive(&self, pid: u32, alive: bool) {
        let mut state = self.state.lock().unwrap();
        if alive {
            state.alive.insert(pid);
        } else {
            state.alive.remove(&pid);
        }
    }

    /// Restricts the alive probe to processes under this executable name.
    pub fn set_expected_name(&self, name: &str) {
        self.state.lock().unwrap().expected_name = Some(name.to_string());
    }

    /// Whether a kill (signal or taskkill) actually removes the process.
    pub fn set_die_on_kill(&self, die: bool) {
        self.state.lock().unwrap().die_on_kill = die;
    }

    /// Whether spawns emit `Connected` immediately.
    pub fn set_connect_on_spawn(&self, connect: bool) {
        self.state.lock().unwrap().connect_on_spawn = connect;
    }

    pub fn latest_daemon(&self) -> Arc<DaemonScript> {
        self.state
            .lock()
            .unwrap()
            .daemons
            .last()
            .expect("a daemon was spawned")
            .clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().daemons.len()
    }

    pub fn terminations(&self) -> Vec<u32> {
        self.state.lock().unwrap().terminations.clone()
    }

    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().execs.clone()
    }

    fn kill_effect(state: &mut StubState, pid: u32) {
        if state.die_on_kill {
            state.alive.remove(&pid);
        }
    }
}

#[async_trait]
impl OsAdapter for StubOs {
    async fn spawn_daemon(
        &self,
        _config: &DaemonConfig,
        _log: &LogSink,
    ) -> io::Result<SpawnedDaemon> {
        let (tx, rx) = mpsc::channel(32);
        let (script, connect) = {
            let mut state = self.state.lock().unwrap();
            let pid = state.next_pid;
            state.next_pid += 1;
            state.alive.insert(pid);
            let script = Arc::new(DaemonScript {
                pid,
                events: tx.clone(),
                sent: Mutex::new(Vec::new()),
                disconnected: AtomicBool::new(false),
            });
            state.daemons.push(script.clone());
            (script, state.connect_on_spawn)
        };
        if connect {
            let _ = tx.send(ChildEvent::Connected).await;
        }
        Ok(SpawnedDaemon {
            channel: Box::new(StubChannel { script }),
            events: rx,
        })
    }

    async fn exec(&self, program: &str, args: &[String]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.execs.push((program.to_string(), args.to_vec()));
        if program == "taskkill" {
            if let Some(pid) = args.get(1).and_then(|a| a.parse().ok()) {
                StubOs::kill_effect(&mut state, pid);
            }
        }
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path:?}")))
    }

    async fn open_log(&self, _path: &Path) -> io::Result<LogSink> {
        Ok(LogSink::new(tempfile::tempfile()?))
    }

    async fn alive(&self, pid: u32, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        if let Some(expected) = &state.expected_name {
            if expected != name {
                return false;
            }
        }
        state.alive.contains(&pid)
    }

    async fn terminate(&self, pid: u32) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminations.push(pid);
        StubOs::kill_effect(&mut state, pid);
        Ok(())
    }
}

/// Listener that records callback order and crash/error payloads.
#[derive(Default)]
pub struct RecordingListener {
    pub callbacks: Mutex<Vec<String>>,
    pub crashes: Mutex<Vec<(Option<i32>, Option<i32>)>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn record(&self, label: &str) {
        self.callbacks.lock().unwrap().push(label.to_string());
    }

    pub fn seen(&self) -> Vec<String> {
        self.callbacks.lock().unwrap().clone()
    }
}

#[async_trait]
impl LifecycleListener for RecordingListener {
    async fn on_starting(&self) {
        self.record("starting");
    }
    async fn on_running(&self) {
        self.record("running");
    }
    async fn on_exiting(&self) {
        self.record("exiting");
    }
    async fn on_stopping(&self) {
        self.record("stopping");
    }
    async fn on_stopped(&self) {
        self.record("stopped");
    }
    async fn on_updating(&self) {
        self.record("updating");
    }
    async fn on_updated(&self) {
        self.record("updated");
    }
    async fn on_update_failed(&self) {
        self.record("update_failed");
    }
    async fn on_unrecoverable(&self) {
        self.record("unrecoverable");
    }
    async fn on_crashed(&self, code: Option<i32>, signal: Option<i32>) {
        self.crashes.lock().unwrap().push((code, signal));
        self.record("crashed");
    }
    async fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
        self.record("errored");
    }
    fn name(&self) -> &'static str {
        "recording-listener"
    }
}

/// Broadcaster that records the transition stream and TLS forwards.
#[derive(Default)]
pub struct RecordingBroadcast {
    pub states: Mutex<Vec<LifecycleState>>,
    pub tls_ports: Mutex<Vec<u16>>,
}

impl RecordingBroadcast {
    pub fn state_labels(&self) -> Vec<String> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.as_label().to_string())
            .collect()
    }

    pub fn tls_ports(&self) -> Vec<u16> {
        self.tls_ports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcast for RecordingBroadcast {
    async fn broadcast_state_change(&self, state: LifecycleState) {
        self.states.lock().unwrap().push(state);
    }

    async fn broadcast_tls_config(&self, tls: &TlsConfig) {
        self.tls_ports.lock().unwrap().push(tls.port);
    }

    fn name(&self) -> &'static str {
        "recording-broadcast"
    }
}
