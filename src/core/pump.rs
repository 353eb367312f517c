//! # Channel event pump.
//!
//! One pump task per daemon attachment drains the spawn's event stream and
//! drives the core's handlers. Events are processed strictly one at a time,
//! so message, exit, and error handling never interleave with each other.
//!
//! The pump's token is cancelled on every reset, which detaches the channel
//! listeners: events still queued for a torn-down attachment are dropped
//! with the receiver. The pump holds only a weak core handle, so a dropped
//! supervisor ends its pumps instead of being kept alive by them.

use std::sync::Weak;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::messages::ChildEvent;

use super::supervisor::Core;

/// Spawns the pump for one daemon attachment.
pub(super) fn spawn(
    core: Weak<Core>,
    mut events: mpsc::Receiver<ChildEvent>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = events.recv() => {
                    let Some(ev) = ev else { break };
                    let Some(core) = core.upgrade() else { break };
                    match ev {
                        ChildEvent::Connected => core.mark_connected(),
                        ChildEvent::Message(frame) => core.handle_message(frame).await,
                        ChildEvent::Exit { code, signal } => {
                            core.handle_exit(code, signal).await
                        }
                        ChildEvent::Error(message) => {
                            core.handle_channel_error(message).await
                        }
                    }
                }
            }
        }
    });
}
