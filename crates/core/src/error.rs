// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across crates. Crate-specific variants
//! (e.g. `StoreError`, `IpcProtocolError`) live with their owning crate and
//! wrap or are wrapped by these where the boundary crosses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("binary '{0}' is not executable")]
    NotExecutable(String),
    #[error("working directory does not exist: {0}")]
    CwdMissing(String),
    #[error("a process for task {0} is already live")]
    AlreadyRunning(String),
    #[error("spawn failed: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum DriverResolutionError {
    #[error("no driver registered for agent '{0}'")]
    NotFound(String),
}

#[derive(Debug, Error)]
#[error("operation timed out after {0:?}")]
pub struct Timeout(pub std::time::Duration);

#[derive(Debug, Error)]
#[error("operation cancelled")]
pub struct Cancelled;
