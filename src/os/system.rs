//! # Production OS adapter.
//!
//! [`SystemOs`] spawns the daemon with `tokio::process`, wires the IPC
//! channel over a Unix socketpair `dup2`'d onto fd 3 in the child, pumps
//! newline-delimited JSON frames off the parent end, and watches for
//! process exit. The alive probe goes through `sysinfo` so a recycled pid
//! belonging to some other binary is not mistaken for the daemon.
//!
//! Spawning with an IPC channel is unix-only; other platforms get
//! `io::ErrorKind::Unsupported` from [`OsAdapter::spawn_daemon`].

use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::config::DaemonConfig;

use super::{LogSink, OsAdapter, SpawnedDaemon};

/// OS adapter backed by the real system.
#[derive(Default)]
pub struct SystemOs;

impl SystemOs {
    /// Creates the production adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OsAdapter for SystemOs {
    async fn spawn_daemon(
        &self,
        config: &DaemonConfig,
        log: &LogSink,
    ) -> io::Result<SpawnedDaemon> {
        imp::spawn_daemon(config, log).await
    }

    async fn exec(&self, program: &str, args: &[String]) -> io::Result<()> {
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    }

    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn open_log(&self, path: &Path) -> io::Result<LogSink> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(LogSink::new(file.into_std().await))
    }

    async fn alive(&self, pid: u32, name: &str) -> bool {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || probe_alive(pid, &name))
            .await
            .unwrap_or(false)
    }

    async fn terminate(&self, pid: u32) -> io::Result<()> {
        imp::terminate(pid)
    }
}

/// Checks that `pid` is running and its executable name contains `name`.
fn probe_alive(pid: u32, name: &str) -> bool {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target)
        .map(|proc| proc.name().to_string_lossy().contains(name))
        .unwrap_or(false)
}

#[cfg(unix)]
mod imp {
    use std::io;
    use std::os::unix::io::IntoRawFd;
    use std::process::Stdio;

    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::OwnedWriteHalf;
    use tokio::net::UnixStream;
    use tokio::sync::{mpsc, Mutex};
    use tokio_util::sync::CancellationToken;
    use tracing::debug;

    use crate::config::DaemonConfig;
    use crate::messages::{ChildEvent, NodeRequest};
    use crate::os::{DaemonChannel, LogSink, SpawnedDaemon};

    /// File descriptor the daemon expects its IPC channel on.
    const IPC_FD: i32 = 3;

    /// Capacity of the per-daemon channel event queue.
    const EVENT_QUEUE: usize = 64;

    pub(super) async fn spawn_daemon(
        config: &DaemonConfig,
        log: &LogSink,
    ) -> io::Result<SpawnedDaemon> {
        let (ours, theirs) = std::os::unix::net::UnixStream::pair()?;
        ours.set_nonblocking(true)?;
        let ipc = UnixStream::from_std(ours)?;
        let theirs_fd = theirs.into_raw_fd();

        let mut cmd = tokio::process::Command::new(&config.node_path);
        cmd.args(&config.node_args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?));
        unsafe {
            // Runs in the forked child: move the socket onto the
            // conventional IPC fd and make sure it survives exec.
            cmd.pre_exec(move || {
                if theirs_fd == IPC_FD {
                    let flags = libc::fcntl(IPC_FD, libc::F_GETFD);
                    if flags < 0
                        || libc::fcntl(IPC_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0
                    {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(theirs_fd, IPC_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let spawned = cmd.spawn();
        // The child's end belongs to the child now either way.
        unsafe { libc::close(theirs_fd) };
        let mut child = spawned?;

        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("daemon exited before its pid was observed"))?;

        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let token = CancellationToken::new();
        let (read_half, write_half) = ipc.into_split();

        let frame_tx = events_tx.clone();
        let frame_token = token.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                tokio::select! {
                    _ = frame_token.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<serde_json::Value>(line) {
                                Ok(frame) => {
                                    if frame_tx.send(ChildEvent::Message(frame)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(error) => {
                                    debug!(%error, "discarding non-JSON line on daemon ipc");
                                }
                            }
                        }
                        // EOF: the daemon closed its end; exit comes from the
                        // wait task.
                        Ok(None) => break,
                        Err(error) => {
                            let _ = frame_tx.send(ChildEvent::Error(error.to_string())).await;
                            break;
                        }
                    }
                }
            }
        });

        let exit_tx = events_tx.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    use std::os::unix::process::ExitStatusExt;
                    let _ = exit_tx
                        .send(ChildEvent::Exit {
                            code: status.code(),
                            signal: status.signal(),
                        })
                        .await;
                }
                Err(error) => {
                    let _ = exit_tx.send(ChildEvent::Error(error.to_string())).await;
                }
            }
        });

        // Channel tasks are wired; the supervisor may query the port.
        let _ = events_tx.send(ChildEvent::Connected).await;

        Ok(SpawnedDaemon {
            channel: Box::new(SystemChannel {
                pid,
                writer: Mutex::new(Some(write_half)),
                token,
            }),
            events,
        })
    }

    pub(super) fn terminate(pid: u32) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
    }

    /// Parent side of the spawned daemon's IPC channel.
    struct SystemChannel {
        pid: u32,
        writer: Mutex<Option<OwnedWriteHalf>>,
        token: CancellationToken,
    }

    #[async_trait]
    impl DaemonChannel for SystemChannel {
        fn pid(&self) -> u32 {
            self.pid
        }

        async fn send(&self, frame: &NodeRequest) -> io::Result<()> {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "ipc channel disconnected")
            })?;
            let mut line = serde_json::to_vec(frame)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await
        }

        async fn disconnect(&self) {
            self.token.cancel();
            // Dropping the write half sends EOF to the daemon.
            self.writer.lock().await.take();
        }
    }

    impl Drop for SystemChannel {
        fn drop(&mut self) {
            self.token.cancel();
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    use crate::config::DaemonConfig;
    use crate::os::{LogSink, SpawnedDaemon};

    pub(super) async fn spawn_daemon(
        _config: &DaemonConfig,
        _log: &LogSink,
    ) -> io::Result<SpawnedDaemon> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "daemon spawn with an ipc channel requires unix",
        ))
    }

    pub(super) fn terminate(_pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "signal delivery requires unix; use the taskkill exec path",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_wrong_name() {
        // Our own pid is alive, but not under a nonsense executable name.
        let pid = std::process::id();
        assert!(!probe_alive(pid, "definitely-not-this-binary-name"));
    }

    #[tokio::test]
    async fn open_log_appends() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        std::fs::write(&path, b"first\n").unwrap();

        let os = SystemOs::new();
        let sink = os.open_log(&path).await.unwrap();
        let mut handle = sink.try_clone().unwrap();
        handle.write_all(b"second\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
