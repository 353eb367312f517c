//! # IPC frames exchanged with the daemon.
//!
//! The daemon speaks newline-delimited JSON over the IPC channel. Frames are
//! externally tagged:
//!
//! ```text
//! supervisor → daemon   {"QueryPort":[]}
//!                       {"SetFInject":["fault-id",true]}
//! daemon → supervisor   {"Started":[]}
//!                       {"ReplyPort":8090}
//!                       {"FInjects":["fault-id"]}
//! ```
//!
//! ## Rules
//! - `ReplyPort` triggers TLS assembly; `FInjects` replaces the active fault
//!   set; `Started` and anything unrecognized is logged and ignored.
//! - Decoding is tolerant: an unknown frame is not a channel error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound frame to the daemon.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum NodeRequest {
    /// Ask the daemon to announce its listening port.
    QueryPort(Vec<String>),
    /// Enable or disable a named fault injection.
    SetFInject((String, bool)),
}

impl NodeRequest {
    /// The port query sent once after the channel connects.
    pub fn query_port() -> Self {
        NodeRequest::QueryPort(Vec::new())
    }

    /// A fault-injection change request.
    pub fn set_fault(fault: impl Into<String>, enabled: bool) -> Self {
        NodeRequest::SetFInject((fault.into(), enabled))
    }
}

/// Inbound frame from the daemon, decoded from a raw JSON value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum NodeMessage {
    /// Handshake-style announcement; logged and ignored.
    Started(Value),
    /// The daemon's listening port; triggers TLS assembly.
    ReplyPort(u16),
    /// The currently active fault-injection set.
    FInjects(Vec<String>),
}

/// Attempts a typed decode of a raw inbound frame.
///
/// Returns `None` for frames the supervisor does not understand; the caller
/// logs and ignores those.
pub fn decode_frame(frame: &Value) -> Option<NodeMessage> {
    NodeMessage::deserialize(frame).ok()
}

/// Event delivered by the child IPC channel.
#[derive(Debug, Clone)]
pub enum ChildEvent {
    /// The channel is wired up; `start` may proceed to the port query.
    Connected,
    /// A raw inbound frame.
    Message(Value),
    /// The child exited with the given code and/or signal.
    Exit {
        /// Process exit code, if the process exited normally.
        code: Option<i32>,
        /// Terminating signal number, if the process was signalled.
        signal: Option<i32>,
    },
    /// The channel failed.
    Error(String),
}
