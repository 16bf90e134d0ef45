// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the `TaskStore` interface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("review not found: {0}")]
    ReviewNotFound(String),

    #[error("storage I/O error: {0}")]
    Io(String),
}
