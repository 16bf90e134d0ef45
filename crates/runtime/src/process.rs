// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ProcessManager`: owns every child process spawned by the runner.
//!

use fuel_core::{ExitClassification, ProcessResult, ProcessType, ProcessView, TaskId};
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Errors surfaced by [`ProcessManager::spawn`].
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

/// Default per-stream ring buffer capacity.
pub const DEFAULT_RING_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default idle timeout before a silent process is killed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default max wall-clock runtime before a process is killed.
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(3600);

/// Default grace period `shutdown()` waits before force-killing children.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bounded byte buffer that discards the oldest bytes once full, retaining
/// only a running count of how much has been dropped.
struct RingBuffer {
    capacity: usize,
    bytes: VecDeque<u8>,
    truncated: u64,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bytes: VecDeque::new(),
            truncated: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        for &b in chunk {
            if self.bytes.len() >= self.capacity {
                self.bytes.pop_front();
                self.truncated += 1;
            }
            self.bytes.push_back(b);
        }
    }

    fn snapshot(&self) -> String {
        let body = String::from_utf8_lossy(&self.bytes.iter().copied().collect::<Vec<u8>>()).into_owned();
        if self.truncated > 0 {
            format!("[truncated {} bytes]\n{}", self.truncated, body)
        } else {
            body
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct ProcessHandle {
    run_id: String,
    agent: String,
    pid: u32,
    process_type: ProcessType,
    started_at_ms: u64,
    start_instant: Instant,
    last_output_instant: Arc<SyncMutex<Instant>>,
    stdout: Arc<SyncMutex<RingBuffer>>,
    stderr: Arc<SyncMutex<RingBuffer>>,
    kill_tx: mpsc::Sender<()>,
}

struct SpawnArgs {
    task_id: TaskId,
    run_id: String,
    agent: String,
    pid: u32,
    process_type: ProcessType,
    started_at_ms: u64,
    start_instant: Instant,
    idle_timeout: Duration,
    max_runtime: Duration,
}

/// Spawns, tracks, and reaps agent subprocesses.
pub struct ProcessManager {
    processes: Arc<SyncMutex<HashMap<TaskId, ProcessHandle>>>,
    result_tx: mpsc::UnboundedSender<ProcessResult>,
    result_rx: AsyncMutex<mpsc::UnboundedReceiver<ProcessResult>>,
    ring_buffer_capacity: usize,
    idle_timeout: Duration,
    max_runtime: Duration,
    shutdown_grace: Duration,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::with_policy(
            DEFAULT_RING_BUFFER_CAPACITY,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_MAX_RUNTIME,
            DEFAULT_SHUTDOWN_GRACE,
        )
    }

    pub fn with_policy(
        ring_buffer_capacity: usize,
        idle_timeout: Duration,
        max_runtime: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            processes: Arc::new(SyncMutex::new(HashMap::new())),
            result_tx,
            result_rx: AsyncMutex::new(result_rx),
            ring_buffer_capacity,
            idle_timeout,
            max_runtime,
            shutdown_grace,
        }
    }

    /// Start `command argv...` in `cwd`, piping stdout/stderr. Fails if the
    /// binary can't be found, `cwd` doesn't exist, or this task already has
    /// a live process.
    pub fn spawn(
        &self,
        task_id: TaskId,
        run_id: impl Into<String>,
        agent: impl Into<String>,
        command: &str,
        argv: &[String],
        cwd: &Path,
        process_type: ProcessType,
    ) -> Result<ProcessView, SpawnError> {
        if self.processes.lock().contains_key(&task_id) {
            return Err(SpawnError::AlreadyRunning(task_id.to_string()));
        }
        if !cwd.exists() {
            return Err(SpawnError::CwdMissing(cwd.display().to_string()));
        }

        let mut cmd = Command::new(command);
        cmd.args(argv)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpawnError::NotExecutable(command.to_string())
            } else {
                SpawnError::Io(e.to_string())
            }
        })?;

        let pid = child.id().ok_or_else(|| SpawnError::Io("child exited before pid was available".to_string()))?;
        let started_at_ms = now_ms();
        let start_instant = Instant::now();
        let last_output_instant = Arc::new(SyncMutex::new(start_instant));
        let stdout_buf = Arc::new(SyncMutex::new(RingBuffer::new(self.ring_buffer_capacity)));
        let stderr_buf = Arc::new(SyncMutex::new(RingBuffer::new(self.ring_buffer_capacity)));

        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, stdout_buf.clone(), last_output_instant.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, stderr_buf.clone(), last_output_instant.clone());
        }

        let (kill_tx, kill_rx) = mpsc::channel(1);
        let run_id = run_id.into();
        let agent = agent.into();

        let args = SpawnArgs {
            task_id: task_id.clone(),
            run_id: run_id.clone(),
            agent: agent.clone(),
            pid,
            process_type,
            started_at_ms,
            start_instant,
            idle_timeout: self.idle_timeout,
            max_runtime: self.max_runtime,
        };

        tokio::spawn(supervise(
            child,
            args,
            last_output_instant.clone(),
            kill_rx,
            self.result_tx.clone(),
            self.processes.clone(),
            stdout_buf.clone(),
            stderr_buf.clone(),
        ));

        self.processes.lock().insert(
            task_id.clone(),
            ProcessHandle {
                run_id: run_id.clone(),
                agent: agent.clone(),
                pid,
                process_type,
                started_at_ms,
                start_instant,
                last_output_instant: last_output_instant.clone(),
                stdout: stdout_buf,
                stderr: stderr_buf,
                kill_tx,
            },
        );

        Ok(ProcessView {
            task_id,
            run_id,
            agent,
            pid,
            process_type,
            started_at_ms,
            last_output_at_ms: started_at_ms,
        })
    }

    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.processes.lock().contains_key(task_id)
    }

    pub fn running_count(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn running_processes(&self) -> Vec<ProcessView> {
        self.processes
            .lock()
            .iter()
            .map(|(task_id, handle)| handle.view(task_id))
            .collect()
    }

    /// Snapshot of a process's ring buffers. Does not drain them.
    pub fn get_output(&self, task_id: &TaskId) -> Option<(String, String)> {
        let processes = self.processes.lock();
        let handle = processes.get(task_id)?;
        Some((handle.stdout.lock().snapshot(), handle.stderr.lock().snapshot()))
    }

    /// Request termination of a task's process. The actual exit is observed
    /// asynchronously through `wait_for_any`/`wait_for_all`.
    pub async fn kill(&self, task_id: &TaskId) {
        let kill_tx = self.processes.lock().get(task_id).map(|h| h.kill_tx.clone());
        if let Some(kill_tx) = kill_tx {
            let _ = kill_tx.send(()).await;
        }
    }

    /// Suspend until any owned child exits or `timeout_ms` elapses
    /// (`0` polls without blocking).
    pub async fn wait_for_any(&self, timeout_ms: u64) -> Option<ProcessResult> {
        let mut rx = self.result_rx.lock().await;
        tokio::time::timeout(Duration::from_millis(timeout_ms), rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Collect every terminal result observed within `timeout_ms`.
    pub async fn wait_for_all(&self, timeout_ms: u64) -> Vec<ProcessResult> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut results = Vec::new();
        let mut rx = self.result_rx.lock().await;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(result)) => results.push(result),
                _ => break,
            }
        }
        results
    }

    /// Terminate every live child, waiting up to the configured grace
    /// period before force-killing, then drain all state.
    pub async fn shutdown(&self) {
        let task_ids: Vec<TaskId> = self.processes.lock().keys().cloned().collect();
        for task_id in &task_ids {
            self.kill(task_id).await;
        }
        let _ = self.wait_for_all(self.shutdown_grace.as_millis() as u64).await;
        self.processes.lock().clear();
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHandle {
    fn view(&self, task_id: &TaskId) -> ProcessView {
        let last_output_at_ms = self.started_at_ms
            + self
                .last_output_instant
                .lock()
                .duration_since(self.start_instant)
                .as_millis() as u64;
        ProcessView {
            task_id: task_id.clone(),
            run_id: self.run_id.clone(),
            agent: self.agent.clone(),
            pid: self.pid,
            process_type: self.process_type,
            started_at_ms: self.started_at_ms,
            last_output_at_ms,
        }
    }
}

fn spawn_reader<R>(mut reader: R, buf: Arc<SyncMutex<RingBuffer>>, last_output: Arc<SyncMutex<Instant>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    buf.lock().push(&chunk[..n]);
                    *last_output.lock() = Instant::now();
                }
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
async fn supervise(
    mut child: Child,
    args: SpawnArgs,
    last_output_instant: Arc<SyncMutex<Instant>>,
    mut kill_rx: mpsc::Receiver<()>,
    result_tx: mpsc::UnboundedSender<ProcessResult>,
    processes: Arc<SyncMutex<HashMap<TaskId, ProcessHandle>>>,
    stdout_buf: Arc<SyncMutex<RingBuffer>>,
    stderr_buf: Arc<SyncMutex<RingBuffer>>,
) {
    let mut poll = tokio::time::interval(Duration::from_secs(1));
    let classification = loop {
        tokio::select! {
            status = child.wait() => {
                break classify_exit(status);
            }
            _ = kill_rx.recv() => {
                let _ = child.start_kill();
            }
            _ = poll.tick() => {
                let idle_elapsed = Instant::now().duration_since(*last_output_instant.lock());
                let total_elapsed = args.start_instant.elapsed();
                if idle_elapsed >= args.idle_timeout || total_elapsed >= args.max_runtime {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    break ExitClassification::FailedTimeout;
                }
            }
        }
    };

    processes.lock().remove(&args.task_id);

    let exit_code = match &classification {
        ExitClassification::Succeeded => Some(0),
        ExitClassification::FailedExit(code) => Some(*code),
        _ => None,
    };

    let result = ProcessResult {
        task_id: args.task_id,
        run_id: args.run_id,
        agent: args.agent,
        process_type: args.process_type,
        classification,
        exit_code,
        stdout: stdout_buf.lock().snapshot(),
        stderr: stderr_buf.lock().snapshot(),
        started_at_ms: args.started_at_ms,
        ended_at_ms: now_ms(),
    };

    let _ = result_tx.send(result);
}

#[cfg(unix)]
fn classify_exit(status: std::io::Result<std::process::ExitStatus>) -> ExitClassification {
    use std::os::unix::process::ExitStatusExt;
    match status {
        Ok(status) if status.success() => ExitClassification::Succeeded,
        Ok(status) => match status.code() {
            Some(code) => ExitClassification::FailedExit(code),
            None => ExitClassification::FailedSignal(status.signal().unwrap_or(-1)),
        },
        Err(_) => ExitClassification::FailedSpawn,
    }
}

#[cfg(not(unix))]
fn classify_exit(status: std::io::Result<std::process::ExitStatus>) -> ExitClassification {
    match status {
        Ok(status) if status.success() => ExitClassification::Succeeded,
        Ok(status) => ExitClassification::FailedExit(status.code().unwrap_or(-1)),
        Err(_) => ExitClassification::FailedSpawn,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
