// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin IPC client for the peer commands (`status`, `pause`, `resume`,
//! `logs`): connects to a running daemon's socket, sends one request, and
//! maps the outcome onto the exit-code convention those commands share —
//! 0 on success, 1 when the daemon can't be reached, 2 when it rejects the
//! request.

use std::path::Path;

use fuel_daemon::{protocol_wire, LifecycleConfig, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("daemon unreachable: {0}")]
    Unreachable(String),
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
}

impl PeerError {
    /// Exit code this error should surface as, per the IPC client
    /// convention: 1 for an unreachable daemon, 2 for a rejected request.
    pub fn exit_code(&self) -> i32 {
        match self {
            PeerError::Unreachable(_) => 1,
            PeerError::Rejected { .. } => 2,
        }
    }
}

/// Connect to the daemon serving `project_root` and send a single request,
/// waiting for its reply.
pub async fn send(project_root: &Path, request: Request) -> Result<Response, PeerError> {
    let config = LifecycleConfig::load(project_root.to_path_buf())
        .map_err(|err| PeerError::Unreachable(err.to_string()))?;

    let mut stream = UnixStream::connect(&config.socket_path)
        .await
        .map_err(|err| PeerError::Unreachable(format!("{}: {err}", config.socket_path.display())))?;

    let bytes = protocol_wire::encode(&request).map_err(|err| PeerError::Unreachable(err.to_string()))?;
    protocol_wire::write_message(&mut stream, &bytes)
        .await
        .map_err(|err| PeerError::Unreachable(err.to_string()))?;

    let reply = protocol_wire::read_message(&mut stream)
        .await
        .map_err(|err| PeerError::Unreachable(err.to_string()))?;
    let response: Response =
        protocol_wire::decode(&reply).map_err(|err| PeerError::Unreachable(err.to_string()))?;

    match response {
        Response::Error { code, message } => Err(PeerError::Rejected { code, message }),
        other => Ok(other),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
