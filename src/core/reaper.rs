//! # Orphan reaping.
//!
//! A supervisor that dies abnormally can leave its daemon behind. Before
//! every start the core looks up the pid persisted by the previous run,
//! asks the alive probe whether that pid still belongs to the daemon
//! executable, and if so kills it and waits for it to die. A surviving
//! orphan aborts the start: two daemons on one network would fight over
//! ports and state.

use tracing::{debug, info};

use crate::config::DaemonConfig;
use crate::error::SupervisorError;
use crate::wait::await_condition;

use super::supervisor::Core;

impl Core {
    /// Kills a daemon left behind by a previous supervisor run, if any.
    pub(super) async fn reap_orphan(&self, config: &DaemonConfig) -> Result<(), SupervisorError> {
        let key = config.pid_key();
        let Some(pid) = self.store.get(&key).await? else {
            return Ok(());
        };

        let name = config.node_name();
        if !self.os.alive(pid, &name).await {
            debug!(pid, "previous daemon pid is not alive; nothing to reap");
            return Ok(());
        }

        info!(pid, "daemon from a previous run is still alive; reaping");
        if self.kill_pid(pid).await.is_err() {
            return Err(SupervisorError::OrphanReapFailed { pid });
        }
        await_condition(config.kill_timeout, || async {
            !self.os.alive(pid, &name).await
        })
        .await
        .map_err(|_| SupervisorError::OrphanReapFailed { pid })
    }
}
