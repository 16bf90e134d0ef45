// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared entrypoint wiring every component of together:
//! acquires the pidfile/socket, reconciles prior-crash state, then drives
//! `ConsumeLoop` while the listener serves IPC and broadcasts snapshots.
//! Both the `fueld` binary (`main.rs`) and `fuel-cli`'s `consume`
//! subcommand call this.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fuel_core::{Clock, InstanceId, SystemClock};
use fuel_drivers::AgentDriverRegistry;
use fuel_runtime::{ConsumeConfig, ConsumeLoop, ConsumeSnapshot, ProcessManager};
use fuel_runtime::{HealthTracker, ReviewService};
use fuel_store::{MemoryTaskStore, TaskStore};
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tracing::info;

use crate::lifecycle::{self, Config, LifecycleError, StartupResult};
use crate::listener::{ListenCtx, Listener};
use crate::review_support::{agent_for, GitDiffProvider, SimpleReviewPromptBuilder, SimpleTaskPromptBuilder};

/// Flags accepted by the `consume` command.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub project_root: PathBuf,
    pub interval: Duration,
    pub max_concurrent_per_agent: u32,
    pub once: bool,
    /// Emit every published snapshot as a line of JSON on stdout, not just
    /// the final one returned to the caller.
    pub json: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            interval: Duration::from_secs(2),
            max_concurrent_per_agent: 1,
            once: false,
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Runtime(#[from] fuel_runtime::RuntimeError),
}

/// Broadcast buffer depth for `SnapshotUpdate` frames; a slow subscriber
/// drops the oldest unsent snapshot rather than stalling the publisher.
const SNAPSHOT_BROADCAST_DEPTH: usize = 4;

/// Run the consume host to completion: `Starting` through `Stopped`.
/// Returns the final snapshot (used by `--once`/`--json` callers).
pub async fn run(config: HostConfig) -> Result<ConsumeSnapshot, HostError> {
    let lifecycle_config = Config::load(config.project_root.clone())?;
    let instance_id = InstanceId::new();

    let startup = lifecycle::startup(&lifecycle_config, instance_id.as_str()).await?;
    info!(instance_id = %instance_id, socket = %lifecycle_config.socket_path.display(), "consume host starting");

    let result = run_with_listener(config, startup, instance_id).await;

    Ok(result?)
}

async fn run_with_listener(
    config: HostConfig,
    startup: StartupResult,
    instance_id: InstanceId,
) -> Result<ConsumeSnapshot, HostError> {
    let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
    let processes = Arc::new(ProcessManager::new());
    let health = Arc::new(HealthTracker::new(SystemClock));
    let drivers = Arc::new(AgentDriverRegistry::with_builtin_drivers());
    let diff_provider = Arc::new(GitDiffProvider::new(config.project_root.clone()));
    let review = Arc::new(ReviewService::new(
        store.clone(),
        processes.clone(),
        drivers.clone(),
        diff_provider,
        Arc::new(SimpleReviewPromptBuilder),
        instance_id.as_str().to_string(),
    ));

    let mut max_concurrent_per_agent = std::collections::HashMap::new();
    for agent in fuel_drivers::CANONICAL_AGENTS {
        max_concurrent_per_agent.insert(agent.to_string(), config.max_concurrent_per_agent);
    }
    let consume_config = ConsumeConfig {
        interval: config.interval,
        default_max_concurrent_per_agent: config.max_concurrent_per_agent,
        max_concurrent_per_agent,
        max_total_concurrent: config.max_concurrent_per_agent
            * fuel_drivers::CANONICAL_AGENTS.len() as u32,
        ..ConsumeConfig::default()
    };

    let run_loop = Arc::new(ConsumeLoop::new(
        store,
        processes.clone(),
        health,
        drivers.clone(),
        review,
        Arc::new(SimpleTaskPromptBuilder),
        SystemClock,
        instance_id.as_str(),
        config.project_root.clone(),
        consume_config,
    ));

    let default_agent_name = "claude".to_string();
    let report = run_loop
        .start(|task| agent_for(task, &default_agent_name))
        .await?;
    info!(
        orphaned_runs = report.orphaned_runs.len(),
        recovered_reviews = report.recovered_reviews.len(),
        "startup reconciliation complete"
    );

    let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_BROADCAST_DEPTH);
    let shutdown_notify = Arc::new(Notify::new());

    let ctx = Arc::new(ListenCtx {
        run: run_loop.clone(),
        processes: processes.clone(),
        snapshots: snapshot_tx.clone(),
        shutdown: shutdown_notify.clone(),
    });
    let listener = Listener::new(startup.listener, ctx);
    let listener_task = tokio::spawn(listener.run());

    let final_snapshot = if config.once {
        let snapshot = run_loop.run_once().await?;
        let _ = snapshot_tx.send(snapshot.clone());
        if config.json {
            print_snapshot(&snapshot);
        }
        snapshot
    } else {
        drive_until_stopped(&run_loop, &snapshot_tx, &shutdown_notify, config.json).await
    };

    listener_task.abort();
    startup.shutdown();
    Ok(final_snapshot)
}

/// Drive `ConsumeLoop::run` until it reaches `Stopped`, reacting to SIGINT/
/// SIGTERM and the listener's `shutdown` IPC request the same way: a signal
/// has the same effect as the IPC request.
async fn drive_until_stopped(
    run_loop: &Arc<ConsumeLoop<SystemClock>>,
    snapshot_tx: &broadcast::Sender<ConsumeSnapshot>,
    shutdown_notify: &Arc<Notify>,
    json: bool,
) -> ConsumeSnapshot {
    let run_loop_signals = run_loop.clone();
    tokio::spawn(async move {
        if let Err(err) = wait_for_termination_signal().await {
            tracing::error!(error = %err, "failed to install signal handler");
            return;
        }
        run_loop_signals.request_shutdown();
    });

    let mut last = None;
    let snapshot_tx = snapshot_tx.clone();
    run_loop
        .run(|snapshot| {
            let _ = snapshot_tx.send(snapshot.clone());
            if json {
                print_snapshot(&snapshot);
            }
            last = Some(snapshot);
        })
        .await;
    shutdown_notify.notify_waiters();

    match last {
        Some(snapshot) => snapshot,
        // `run()` publishes at least once per tick and always reaches
        // `Stopped` through one, so this is unreachable in practice; fall
        // back to a fresh snapshot attempt rather than assuming it.
        None => run_loop.snapshot().await.unwrap_or_else(|_| empty_snapshot(run_loop)),
    }
}

/// Emit one snapshot as a line of JSON on stdout, per the `--json` flag's
/// newline-delimited-JSON contract. Malformed snapshot serialization would
/// be an internal bug, not a user-facing condition worth a partial line, so
/// a failure here is silently dropped rather than panicking the host.
fn print_snapshot(snapshot: &ConsumeSnapshot) {
    if let Ok(line) = serde_json::to_string(snapshot) {
        println!("{line}");
    }
}

fn empty_snapshot(run_loop: &Arc<ConsumeLoop<SystemClock>>) -> ConsumeSnapshot {
    fuel_runtime::SnapshotBuilder::build(
        "unknown",
        run_loop.state(),
        run_loop.is_unhealthy(),
        0,
        0,
        &[],
        &[],
        Vec::new(),
        Vec::new(),
        fuel_runtime::EffectiveConfig {
            interval_seconds: 0,
            max_concurrent_per_agent: 0,
            max_total_concurrent: 0,
        },
        0,
        0,
        fuel_runtime::BrowserDaemonStatus { connected: false },
    )
}

#[cfg(unix)]
async fn wait_for_termination_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
