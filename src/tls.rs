//! # TLS configuration harvested from the daemon.
//!
//! At startup the daemon announces its listening port over the IPC channel;
//! the supervisor pairs that port with the three certificate files the
//! daemon wrote under `{tls_path}/client/` and forwards the bundle verbatim
//! to observers. The supervisor never interprets the certificate contents.

use std::io;

use crate::config::DaemonConfig;
use crate::os::OsAdapter;

/// TLS bundle downstream HTTP clients use to reach the daemon.
///
/// Opaque to the supervisor; forwarded verbatim via
/// [`Broadcast::broadcast_tls_config`](crate::Broadcast::broadcast_tls_config).
#[derive(Clone)]
pub struct TlsConfig {
    /// CA certificate bytes (`client/ca.crt`).
    pub ca: Vec<u8>,
    /// Client key bytes (`client/client.key`).
    pub key: Vec<u8>,
    /// Client certificate bytes (`client/client.pem`).
    pub cert: Vec<u8>,
    /// Hostname the daemon listens on.
    pub hostname: String,
    /// Port announced by the daemon's `ReplyPort` message.
    pub port: u16,
}

impl std::fmt::Debug for TlsConfig {
    // Certificate bytes are elided; they are large and secret-adjacent.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("ca_len", &self.ca.len())
            .field("key_len", &self.key.len())
            .field("cert_len", &self.cert.len())
            .finish()
    }
}

/// Reads the three TLS client files and assembles a [`TlsConfig`] for the
/// announced `port`.
///
/// Read failures propagate to the caller, which treats them as channel
/// errors.
pub(crate) async fn load_tls_config(
    os: &dyn OsAdapter,
    config: &DaemonConfig,
    port: u16,
) -> io::Result<TlsConfig> {
    let ca = os.read_file(&config.tls_client_file("ca.crt")).await?;
    let key = os.read_file(&config.tls_client_file("client.key")).await?;
    let cert = os.read_file(&config.tls_client_file("client.pem")).await?;

    Ok(TlsConfig {
        ca,
        key,
        cert,
        hostname: "localhost".to_string(),
        port,
    })
}
