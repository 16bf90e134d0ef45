// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC Protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. See
//! `wire.rs` for the framing itself.
//!
//! Request/reply pairs are matched implicitly by connection ordering: the
//! listener serializes at most one in-flight request per connection at a
//! time. Unsolicited [`Response::SnapshotUpdate`] frames are pushed on
//! every connection on each consume tick until the client sends
//! [`Request::Mute`].

use fuel_runtime::ConsumeSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request from CLI (or another peer) to daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping.
    Ping,

    /// Version handshake.
    Hello { version: String },

    /// Full `ConsumeSnapshot` on demand, independent of the broadcast stream.
    Snapshot,

    /// Lightweight status line, cheaper than a full snapshot for polling.
    Status,

    /// `Running -> Paused`.
    Pause,

    /// `Paused -> Running`.
    Resume,

    /// `Running`/`Paused -> Draining`; the reply is withheld until Draining
    /// completes.
    Shutdown,

    /// stdout/stderr currently buffered for one task's live process.
    Logs { task_id: String },

    /// Opaque payload for the embedded browser-automation daemon. The
    /// runner never interprets `payload`, only forwards it and reports
    /// whether a browser daemon is attached.
    Browser { method: String, payload: Value },

    /// Stop receiving unsolicited `SnapshotUpdate` broadcasts on this
    /// connection.
    Mute,
}

/// Reply from daemon to CLI (or another peer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Pong,
    Hello {
        version: String,
    },
    Snapshot(Box<ConsumeSnapshot>),
    Status {
        state: String,
        unhealthy: bool,
        done_count: u64,
        blocked_count: u64,
    },
    ShuttingDown,
    Logs {
        stdout: String,
        stderr: String,
    },
    /// Forwarded verbatim from the browser daemon, or an error if none is
    /// attached.
    BrowserResult(Value),
    Error {
        code: String,
        message: String,
    },
    /// Unsolicited broadcast pushed on every consume tick.
    SnapshotUpdate(Box<ConsumeSnapshot>),
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
