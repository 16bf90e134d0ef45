// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the execution engine.

use fuel_core::{DriverResolutionError, SpawnError};
use fuel_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("spawn error: {0}")]
    Spawn(#[from] SpawnError),
    #[error("driver resolution error: {0}")]
    DriverResolution(#[from] DriverResolutionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("process not found for task {0}")]
    ProcessNotFound(String),
}
