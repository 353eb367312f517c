//! # External broadcast surface.
//!
//! [`Broadcast`] forwards state changes and the TLS handshake artifact to an
//! external observer (typically a UI process). Two callbacks:
//! - `broadcast_state_change` on every transition,
//! - `broadcast_tls_config` exactly once per entry into `Running`.
//!
//! ## Contract
//! - Invoked from a dedicated dispatch worker after the supervisor's
//!   internal state update. Each sink is delivered independently, every
//!   sink seeing events in the same publication order; there is no
//!   cross-sink ordering between a broadcast and the matching listener
//!   callback.
//! - Panics are caught and logged; they never reach the supervisor.

use async_trait::async_trait;

use crate::state::LifecycleState;
use crate::tls::TlsConfig;

/// Forwards supervisor state to an external observer.
#[async_trait]
pub trait Broadcast: Send + Sync + 'static {
    /// Announces a lifecycle transition.
    async fn broadcast_state_change(&self, state: LifecycleState);

    /// Forwards the assembled TLS bundle.
    async fn broadcast_tls_config(&self, tls: &TlsConfig);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Broadcaster that drops everything; the default for headless use.
pub struct NullBroadcast;

#[async_trait]
impl Broadcast for NullBroadcast {
    async fn broadcast_state_change(&self, _state: LifecycleState) {}

    async fn broadcast_tls_config(&self, _tls: &TlsConfig) {}

    fn name(&self) -> &'static str {
        "null-broadcast"
    }
}
