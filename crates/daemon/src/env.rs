// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};

use crate::lifecycle::LifecycleError;

/// Resolve the state directory the daemon reads/writes its pidfile, socket,
/// and logs under: `FUEL_HOME` override, else `<project_root>/.fuel`.
pub fn state_dir(project_root: &Path) -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FUEL_HOME") {
        return Ok(PathBuf::from(dir));
    }
    Ok(project_root.join(".fuel"))
}

/// `FUEL_LOG_LEVEL`, defaulting to `info`.
pub fn log_level() -> String {
    std::env::var("FUEL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}
