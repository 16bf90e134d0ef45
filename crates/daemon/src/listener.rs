// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC accept loop and request dispatch.
//!
//! One task per accepted connection, timeout-bounded framed reads, and
//! differentiated logging by error kind. Each connection splits its stream
//! and runs a dedicated writer task that interleaves request replies with
//! unsolicited `SnapshotUpdate` frames pulled off a `tokio::sync::broadcast`
//! channel, whose built-in drop-oldest-on-lag behavior is exactly the
//! slow-subscriber handling a snapshot broadcast needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fuel_core::{Clock, TaskId};
use fuel_runtime::{ConsumeLoop, ConsumeSnapshot, ProcessManager, RunnerState};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};
use crate::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT};

/// Longer than [`DEFAULT_TIMEOUT`]: a peer may hold a connection open for a
/// long time between requests while only listening for snapshot broadcasts.
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared context every accepted connection dispatches requests against.
pub struct ListenCtx<C: Clock> {
    pub run: Arc<ConsumeLoop<C>>,
    pub processes: Arc<ProcessManager>,
    pub snapshots: broadcast::Sender<ConsumeSnapshot>,
    /// Signaled once the daemon should tear down its listener and exit.
    pub shutdown: Arc<Notify>,
}

pub struct Listener<C: Clock> {
    socket: UnixListener,
    ctx: Arc<ListenCtx<C>>,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl<C: Clock> Listener<C> {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { socket, ctx }
    }

    /// Accept connections until the process exits. Each connection is
    /// handled on its own task so one slow or stuck peer never blocks
    /// another.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, ctx).await {
                            log_connection_error(&err);
                        }
                    });
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                }
            }
        }
    }
}

fn log_connection_error(err: &ConnectionError) {
    match err {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("client disconnected");
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => {
            warn!("connection timed out waiting for a request");
        }
        other => error!(error = %other, "connection error"),
    }
}

async fn handle_connection<C: Clock>(
    stream: UnixStream,
    ctx: Arc<ListenCtx<C>>,
) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut snapshot_rx = ctx.snapshots.subscribe();
    let (tx, mut rx) = mpsc::channel::<Response>(8);
    let muted = Arc::new(AtomicBool::new(false));

    let writer_muted = muted.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => {
                    let Some(response) = msg else { break };
                    if protocol_wire::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                snap = snapshot_rx.recv() => {
                    match snap {
                        Ok(snapshot) if !writer_muted.load(Ordering::Relaxed) => {
                            let response = Response::SnapshotUpdate(Box::new(snapshot));
                            if protocol_wire::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(dropped)) => {
                            warn!(dropped, "subscriber lagged behind snapshot broadcast");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    loop {
        let request = match protocol_wire::read_request(&mut reader, READ_IDLE_TIMEOUT).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => break,
            Err(err) => return Err(err.into()),
        };

        if matches!(request, Request::Status | Request::Snapshot | Request::Ping) {
            debug!(?request, "request");
        } else {
            info!(?request, "request");
        }

        if matches!(request, Request::Mute) {
            muted.store(true, Ordering::Relaxed);
            if tx.send(Response::Ok).await.is_err() {
                break;
            }
            continue;
        }

        let response = handle_request(&ctx, request).await;
        let shutting_down = matches!(response, Response::ShuttingDown);
        if tx.send(response).await.is_err() {
            break;
        }
        if shutting_down {
            break;
        }
    }

    drop(tx);
    let _ = writer_task.await;
    Ok(())
}

async fn handle_request<C: Clock>(ctx: &ListenCtx<C>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { .. } => Response::Hello {
            version: protocol_wire::PROTOCOL_VERSION.to_string(),
        },
        Request::Snapshot => match ctx.run.snapshot().await {
            Ok(snapshot) => Response::Snapshot(Box::new(snapshot)),
            Err(err) => Response::error("snapshot_failed", err.to_string()),
        },
        Request::Status => match ctx.run.snapshot().await {
            Ok(snapshot) => Response::Status {
                state: state_label(snapshot.state).to_string(),
                unhealthy: snapshot.unhealthy,
                done_count: snapshot.done_count,
                blocked_count: snapshot.blocked_count,
            },
            Err(err) => Response::error("status_failed", err.to_string()),
        },
        Request::Pause => {
            ctx.run.pause();
            Response::Ok
        }
        Request::Resume => {
            ctx.run.resume();
            Response::Ok
        }
        Request::Shutdown => handle_shutdown(ctx).await,
        Request::Logs { task_id } => match ctx.processes.get_output(&TaskId::new(task_id)) {
            Some((stdout, stderr)) => Response::Logs { stdout, stderr },
            None => Response::error("no_live_process", "no live process for that task"),
        },
        Request::Browser { .. } => {
            Response::error("browser_unavailable", "no browser daemon is attached")
        }
        Request::Mute => Response::Ok,
    }
}

fn state_label(state: RunnerState) -> &'static str {
    match state {
        RunnerState::Starting => "starting",
        RunnerState::Running => "running",
        RunnerState::Paused => "paused",
        RunnerState::Draining => "draining",
        RunnerState::Stopped => "stopped",
    }
}

/// Request Draining, force-terminate every live process, and wait for the
/// run loop to observe `Stopped` before replying: the `shutdown` request
/// returns `ok` only after Draining completes, rather than replying
/// immediately and leaving the caller to poll separately.
async fn handle_shutdown<C: Clock>(ctx: &ListenCtx<C>) -> Response {
    ctx.run.request_shutdown();
    ctx.run.drain().await;
    while ctx.run.state() != RunnerState::Stopped {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
    ctx.shutdown.notify_waiters();
    Response::ShuttingDown
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
