// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown: pidfile acquisition, socket bind, cleanup.
//!
//! Sequencing: acquire the pidfile lock first (before writing anything through it),
//! then create directories, write the pidfile body, and bind the socket
//! last — only once every earlier step has succeeded. `AlreadyRunning` is
//! the one failure that must NOT trigger cleanup, since the files it names
//! belong to the instance that is still running.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::UnixListener;

use crate::env;
use crate::protocol_wire::PROTOCOL_VERSION;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
}

impl Config {
    pub fn load(project_root: PathBuf) -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir(&project_root)?;
        Ok(Self {
            socket_path: state_dir.join("consume-runner.sock"),
            pid_path: state_dir.join("consume-runner.pid"),
            version_path: state_dir.join("consume-runner.version"),
            log_path: state_dir.join("consume-runner.log"),
            state_dir,
            project_root,
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error("failed to acquire pidfile lock: {0}")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("failed to serialize pidfile: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pidfile JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidfileBody {
    pub pid: u32,
    pub port: Option<u16>,
    pub socket_path: Option<String>,
    pub instance_id: String,
    pub started_at: u64,
}

/// Bundle returned by a successful [`startup`]: the bound socket plus
/// everything [`StartupResult::shutdown`] needs to release on exit.
pub struct StartupResult {
    pub config: Config,
    pub listener: UnixListener,
    /// Held only to keep the advisory lock alive; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

impl StartupResult {
    /// Clean shutdown: remove the socket and pidfile. The OS lock releases
    /// implicitly when `lock_file` drops with `self`.
    pub fn shutdown(&self) {
        let _ = fs::remove_file(&self.config.socket_path);
        let _ = fs::remove_file(&self.config.pid_path);
        let _ = fs::remove_file(&self.config.version_path);
    }
}

/// Acquire the pidfile lock, write it, and bind the IPC socket.
///
/// On any failure other than [`LifecycleError::AlreadyRunning`] /
/// [`LifecycleError::LockFailed`], best-effort removes whatever partial
/// state this attempt created.
pub async fn startup(config: &Config, instance_id: &str) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config, instance_id).await {
        Ok(result) => Ok(result),
        Err(e @ LifecycleError::LockFailed(_)) | Err(e @ LifecycleError::AlreadyRunning { .. }) => {
            Err(e)
        }
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config, instance_id: &str) -> Result<StartupResult, LifecycleError> {
    fs::create_dir_all(&config.state_dir)?;

    // truncate(false): don't wipe a running daemon's PID before the lock is
    // confirmed ours.
    let mut lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.pid_path)?;

    lock_file
        .try_lock_exclusive()
        .map_err(|e| lock_failure(&config.pid_path, e))?;

    write_pidfile(&mut lock_file, config, instance_id)?;
    fs::write(&config.version_path, PROTOCOL_VERSION)?;

    // Stale socket from an unclean shutdown; bind last, only once every
    // earlier validation step has passed.
    let _ = fs::remove_file(&config.socket_path);
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    Ok(StartupResult {
        config: config.clone(),
        listener,
        lock_file,
    })
}

fn lock_failure(pid_path: &Path, err: std::io::Error) -> LifecycleError {
    if err.kind() == std::io::ErrorKind::WouldBlock {
        let pid = read_pid_best_effort(pid_path).unwrap_or(0);
        LifecycleError::AlreadyRunning { pid }
    } else {
        LifecycleError::LockFailed(err)
    }
}

fn read_pid_best_effort(pid_path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(pid_path).ok()?;
    let body: PidfileBody = serde_json::from_str(&contents).ok()?;
    Some(body.pid)
}

/// Write the pidfile body into the already-locked file handle in place.
///
/// Deliberately not write-temp-then-rename: the `fs2` lock is held on the
/// open file descriptor, and renaming a different inode over `pid_path`
/// would leave a fresh, unlocked file at that path for the next process to
/// lock successfully, defeating the mutex. Writing through the locked
/// handle keeps the lock and the path's contents tied to the same inode.
fn write_pidfile(
    lock_file: &mut File,
    config: &Config,
    instance_id: &str,
) -> Result<(), LifecycleError> {
    let body = PidfileBody {
        pid: std::process::id(),
        port: None,
        socket_path: Some(config.socket_path.display().to_string()),
        instance_id: instance_id.to_string(),
        started_at: now_ms(),
    };
    let json = serde_json::to_vec(&body)?;
    lock_file.set_len(0)?;
    use std::io::Seek;
    lock_file.seek(std::io::SeekFrom::Start(0))?;
    lock_file.write_all(&json)?;
    lock_file.sync_all()?;
    Ok(())
}

fn cleanup_on_failure(config: &Config) {
    let _ = fs::remove_file(&config.socket_path);
    let _ = fs::remove_file(&config.pid_path);
    let _ = fs::remove_file(&config.version_path);
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Read and parse the pidfile at `pid_path`, if present.
pub fn read_pidfile(pid_path: &Path) -> Option<PidfileBody> {
    let contents = fs::read_to_string(pid_path).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
