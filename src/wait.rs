//! # Bounded condition wait.
//!
//! [`await_condition`] polls an async predicate until it reports true or the
//! budget expires. Every wait in the supervisor is bounded through this
//! primitive: the connection wait, the death waits, the update wait, and the
//! fault-acknowledgement wait.
//!
//! ## Rules
//! - The predicate is checked immediately, then every [`POLL_INTERVAL`].
//! - Timeouts are surfaced as [`Elapsed`]; they are never silent.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, error::Elapsed};

/// Interval between predicate checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Waits up to `budget` for `condition` to report true.
///
/// Returns `Ok(())` as soon as the predicate holds, `Err(Elapsed)` when the
/// budget expires first. A zero budget fails unless the predicate holds on
/// the very first check without suspending.
pub async fn await_condition<F, Fut>(budget: Duration, mut condition: F) -> Result<(), Elapsed>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    time::timeout(budget, async {
        loop {
            if condition().await {
                return;
            }
            time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
}
