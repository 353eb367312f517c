//! # Lifecycle listener callbacks.
//!
//! [`LifecycleListener`] is the extension point for reacting to lifecycle
//! transitions. Every method has a no-op default, so implementations
//! override only what they care about.
//!
//! ## Contract
//! - Callbacks are invoked **after** the supervisor's internal state has
//!   been updated, in transition order, from a dedicated dispatch worker.
//! - The supervisor never awaits a callback from inside a lifecycle
//!   operation; slow listeners delay later notifications, not the
//!   supervisor.
//! - Panics are caught by the dispatch worker and logged; they never reach
//!   the supervisor.

use async_trait::async_trait;

/// Observer of lifecycle transitions, one callback per state.
#[async_trait]
pub trait LifecycleListener: Send + Sync + 'static {
    /// The supervisor began a startup attempt.
    async fn on_starting(&self) {}

    /// TLS assembly finished; the daemon is serving.
    async fn on_running(&self) {}

    /// A child exit was observed from `Running`; classification pending.
    async fn on_exiting(&self) {}

    /// Cooperative shutdown began.
    async fn on_stopping(&self) {}

    /// The daemon is confirmed gone after a stop or kill.
    async fn on_stopped(&self) {}

    /// The supervisor is waiting for a self-update exit.
    async fn on_updating(&self) {}

    /// The daemon exited with the self-update code.
    async fn on_updated(&self) {}

    /// The update wait expired.
    async fn on_update_failed(&self) {}

    /// Startup retries are exhausted.
    async fn on_unrecoverable(&self) {}

    /// The daemon died outside a stop or update path.
    async fn on_crashed(&self, _code: Option<i32>, _signal: Option<i32>) {}

    /// The IPC channel reported an error.
    async fn on_error(&self, _message: &str) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Listener that ignores every transition.
pub struct NullListener;

#[async_trait]
impl LifecycleListener for NullListener {
    fn name(&self) -> &'static str {
        "null-listener"
    }
}
