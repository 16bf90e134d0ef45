// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ConsumeLoop`: the top-level supervisor — tick, select, dispatch, reap,
//! publish.

use crate::error::RuntimeError;
use crate::health::HealthTracker;
use crate::process::ProcessManager;
use crate::review::ReviewService;
use crate::snapshot::{BrowserDaemonStatus, ConsumeSnapshot, EffectiveConfig, RunnerState, SnapshotBuilder};
use fuel_core::{Clock, Epic, FailureType, ProcessType, RunId, RunStatus, Task, TaskId, TaskStatus};
use fuel_drivers::AgentDriverRegistry;
use fuel_store::{RunFinalize, TaskStore};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// The prompt-template renderer is an external collaborator;
/// this is the seam `ConsumeLoop` calls through to render a dispatch prompt
/// from a selected task, mirroring `ReviewService::ReviewPromptBuilder`.
pub trait TaskPromptBuilder: Send + Sync {
    fn build(&self, task: &Task) -> String;
}

/// Tick cadence and concurrency caps.
#[derive(Debug, Clone)]
pub struct ConsumeConfig {
    pub interval: Duration,
    pub default_agent: String,
    pub default_max_concurrent_per_agent: u32,
    pub max_concurrent_per_agent: HashMap<String, u32>,
    pub max_total_concurrent: u32,
    /// Consecutive tick failures before the loop self-pauses.
    pub pause_after_failures: u32,
}

impl ConsumeConfig {
    pub fn max_concurrent_for(&self, agent: &str) -> u32 {
        self.max_concurrent_per_agent
            .get(agent)
            .copied()
            .unwrap_or(self.default_max_concurrent_per_agent)
    }
}

impl Default for ConsumeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            default_agent: "claude".to_string(),
            default_max_concurrent_per_agent: 1,
            max_concurrent_per_agent: HashMap::new(),
            max_total_concurrent: 4,
            pause_after_failures: 3,
        }
    }
}

/// Outcome of startup reconciliation.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub orphaned_runs: Vec<RunId>,
    pub recovered_reviews: Vec<TaskId>,
}

/// Top-level supervisor. Owns no processes, rows, or health counters itself
/// — those stay with `ProcessManager`/`TaskStore`/`HealthTracker`; this type
/// only sequences calls into them each tick, with no cyclic ownership
/// between components.
pub struct ConsumeLoop<C: Clock> {
    store: Arc<dyn TaskStore>,
    processes: Arc<ProcessManager>,
    health: Arc<HealthTracker<C>>,
    drivers: Arc<AgentDriverRegistry>,
    review: Arc<ReviewService>,
    prompts: Arc<dyn TaskPromptBuilder>,
    clock: C,
    instance_id: String,
    cwd: PathBuf,
    config: ConsumeConfig,
    state: SyncMutex<RunnerState>,
    unhealthy: AtomicBool,
    consecutive_tick_failures: AtomicU32,
    /// Incremented once per completed [`Self::tick`], surfaced on
    /// [`ConsumeSnapshot`] so a consumer can detect a stale cached snapshot.
    tick_counter: AtomicU64,
    /// Tasks this instance has live runs for, by task id, so the reap path
    /// can finalize the right row without trusting the provisional run id
    /// tag handed to `ProcessManager::spawn`.
    inflight: SyncMutex<HashMap<TaskId, (RunId, ProcessType)>>,
    epics: SyncMutex<Vec<Epic>>,
    browser: SyncMutex<BrowserDaemonStatus>,
    wake: tokio::sync::Notify,
}

impl<C: Clock> ConsumeLoop<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn TaskStore>,
        processes: Arc<ProcessManager>,
        health: Arc<HealthTracker<C>>,
        drivers: Arc<AgentDriverRegistry>,
        review: Arc<ReviewService>,
        prompts: Arc<dyn TaskPromptBuilder>,
        clock: C,
        instance_id: impl Into<String>,
        cwd: PathBuf,
        config: ConsumeConfig,
    ) -> Self {
        Self {
            store,
            processes,
            health,
            drivers,
            review,
            prompts,
            clock,
            instance_id: instance_id.into(),
            cwd,
            config,
            state: SyncMutex::new(RunnerState::Starting),
            unhealthy: AtomicBool::new(false),
            consecutive_tick_failures: AtomicU32::new(0),
            tick_counter: AtomicU64::new(0),
            inflight: SyncMutex::new(HashMap::new()),
            epics: SyncMutex::new(Vec::new()),
            browser: SyncMutex::new(BrowserDaemonStatus { connected: false }),
            wake: tokio::sync::Notify::new(),
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock()
    }

    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy.load(Ordering::Relaxed)
    }

    pub fn set_epics(&self, epics: Vec<Epic>) {
        *self.epics.lock() = epics;
    }

    pub fn set_browser_status(&self, status: BrowserDaemonStatus) {
        *self.browser.lock() = status;
    }

    fn set_state(&self, state: RunnerState) {
        *self.state.lock() = state;
        self.wake.notify_waiters();
    }

    /// `Running` ↔ `Paused` on IPC request.
    pub fn pause(&self) {
        if *self.state.lock() == RunnerState::Running {
            self.set_state(RunnerState::Paused);
        }
    }

    pub fn resume(&self) {
        if *self.state.lock() == RunnerState::Paused {
            self.consecutive_tick_failures.store(0, Ordering::Relaxed);
            self.unhealthy.store(false, Ordering::Relaxed);
            self.set_state(RunnerState::Running);
        }
    }

    /// `Running`/`Paused` → `Draining` on shutdown request or signal.
    pub fn request_shutdown(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, RunnerState::Draining | RunnerState::Stopped) {
            *state = RunnerState::Draining;
        }
        drop(state);
        self.wake.notify_waiters();
    }

    /// Reconcile rows left by a prior crash, then move to `Running`.
    /// `agent_for` resolves the dispatch agent for a recovered review's
    /// task, mirroring the live dispatch path.
    pub async fn start(&self, agent_for: impl Fn(&Task) -> String) -> Result<StartupReport, RuntimeError> {
        let orphaned_runs = self.reconcile_orphan_runs().await?;
        let recovered_reviews = self.review.recover_stuck_reviews(agent_for, &self.cwd).await?;
        self.set_state(RunnerState::Running);
        Ok(StartupReport {
            orphaned_runs,
            recovered_reviews,
        })
    }

    async fn reconcile_orphan_runs(&self) -> Result<Vec<RunId>, RuntimeError> {
        let orphans = self.store.orphan_runs(&self.instance_id).await?;
        for run_id in &orphans {
            let run = self.store.get_run(run_id).await?;
            self.store.mark_failed(run_id, FailureType::KilledByUser).await?;
            // Best-effort: a task already moved on by some other path simply
            // fails this CAS, which is not an error.
            let _ = self
                .store
                .transition_task(&run.task_id, TaskStatus::InProgress, TaskStatus::Ready)
                .await?;
        }
        Ok(orphans)
    }

    /// One full tick: reap, then (if running) select and dispatch. Publish
    /// is the caller's responsibility — see [`Self::snapshot`].
    pub async fn tick(&self) -> Result<(), RuntimeError> {
        self.reap().await?;
        if self.state() == RunnerState::Running {
            self.dispatch().await?;
        }
        self.tick_counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Drain every terminal `ProcessResult` currently available, in arrival
    /// order, updating Run rows and Health and routing task/review reaps.
    async fn reap(&self) -> Result<(), RuntimeError> {
        loop {
            let Some(result) = self.processes.wait_for_any(0).await else {
                break;
            };
            self.handle_reap(result).await?;
        }
        Ok(())
    }

    async fn handle_reap(&self, result: fuel_core::ProcessResult) -> Result<(), RuntimeError> {
        let task_id = result.task_id.clone();
        let Some((run_id, process_type)) = self.inflight.lock().remove(&task_id) else {
            warn!(task = %task_id, "reaped a process with no tracked run, dropping");
            return Ok(());
        };

        // "succeeded" requires exit code 0 *and* the driver-specific output
        // parser reporting no fatal error. An unresolvable driver can't veto
        // an otherwise-clean exit; it just means no extra metadata is
        // recovered.
        let parsed = self
            .drivers
            .driver_for(&result.agent, None)
            .ok()
            .map(|driver| driver.parse_output(&result.stdout, &result.stderr));
        let parser_error = parsed.as_ref().and_then(|p| p.error_type);
        let succeeded = result.classification.is_success() && parser_error.is_none();
        let failure_type = result.classification.as_failure_type().or(parser_error);

        let run_status = if succeeded {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.store
            .finalize_run(
                &run_id,
                run_status,
                RunFinalize {
                    exit_code: result.exit_code,
                    ended_at_ms: result.ended_at_ms,
                    session_id: parsed.as_ref().and_then(|p| p.session_id.clone()),
                    model: parsed.as_ref().and_then(|p| p.model.clone()),
                    cost_usd: parsed.as_ref().and_then(|p| p.cost_usd),
                    error_type: failure_type,
                    output: Some(result.stdout.clone()),
                },
            )
            .await?;

        match failure_type {
            Some(failure) => self.health.record_failure(&result.agent, failure),
            None => self.health.record_success(&result.agent),
        }

        match process_type {
            ProcessType::Task => {
                if succeeded {
                    let task = self.store.get_task(&task_id).await?;
                    if let Some(review_run_id) = self.review.trigger_review(&task, &result.agent, &self.cwd).await? {
                        self.inflight.lock().insert(task_id, (review_run_id, ProcessType::Review));
                    }
                } else {
                    // Retry indefinitely; Health backoff is what avoids
                    // dispatch storms.
                    let _ = self
                        .store
                        .transition_task(&task_id, TaskStatus::InProgress, TaskStatus::Ready)
                        .await?;
                }
            }
            ProcessType::Review => {
                self.review
                    .complete_review(&task_id, &run_id, &result.stdout, succeeded)
                    .await?;
            }
        }
        Ok(())
    }

    /// Query `ready` tasks, filter by agent availability and per-agent/total
    /// concurrency caps, and dispatch the survivors.
    /// Tie-breaking is whatever order `TaskStore::ready_tasks` returns
    /// (priority asc, created_at asc, short id lexicographic).
    async fn dispatch(&self) -> Result<(), RuntimeError> {
        let ready = self.store.ready_tasks().await?;

        let running = self.processes.running_processes();
        let mut running_per_agent: HashMap<String, u32> = HashMap::new();
        for view in &running {
            *running_per_agent.entry(view.agent.clone()).or_insert(0) += 1;
        }
        let mut total_running = running.len() as u32;

        for task in ready {
            if total_running >= self.config.max_total_concurrent {
                break;
            }
            let agent = task
                .agent_preference
                .clone()
                .unwrap_or_else(|| self.config.default_agent.clone());
            let cap = self.config.max_concurrent_for(&agent);
            if cap == 0 || self.health.is_dead(&agent) || !self.health.is_available(&agent) {
                continue;
            }
            if running_per_agent.get(&agent).copied().unwrap_or(0) >= cap {
                continue;
            }

            match self.dispatch_one(&task, &agent).await {
                Ok(true) => {
                    *running_per_agent.entry(agent).or_insert(0) += 1;
                    total_running += 1;
                }
                Ok(false) => {}
                Err(err) => warn!(task = %task.id, error = %err, "dispatch failed"),
            }
        }
        Ok(())
    }

    /// Transition `task` to `in_progress`, spawn it, and record the Run row.
    /// Returns `Ok(false)` if another instance already claimed the task.
    async fn dispatch_one(&self, task: &Task, agent: &str) -> Result<bool, RuntimeError> {
        let transitioned = self
            .store
            .transition_task(&task.id, TaskStatus::Ready, TaskStatus::InProgress)
            .await?;
        if !transitioned {
            return Ok(false);
        }

        let driver = match self.drivers.driver_for(agent, None) {
            Ok(driver) => driver,
            Err(err) => {
                self.health.record_failure(agent, FailureType::DriverError);
                let _ = self
                    .store
                    .transition_task(&task.id, TaskStatus::InProgress, TaskStatus::Ready)
                    .await;
                return Err(err.into());
            }
        };

        let prompt = self.prompts.build(task);
        let argv = driver.build_argv(&prompt, task);

        let view = match self
            .processes
            .spawn(task.id.clone(), "pending", agent, driver.command(), &argv, &self.cwd, ProcessType::Task)
        {
            Ok(view) => view,
            Err(err) => {
                self.health.record_failure(agent, FailureType::SpawnFailed);
                let _ = self
                    .store
                    .transition_task(&task.id, TaskStatus::InProgress, TaskStatus::Ready)
                    .await;
                return Err(err.into());
            }
        };

        let run_id = self.store.create_run(&task.id, agent, view.pid, &self.instance_id).await?;
        self.inflight.lock().insert(task.id.clone(), (run_id, ProcessType::Task));
        Ok(true)
    }

    /// Build the current [`ConsumeSnapshot`]. `TaskStore` exposes no full
    /// board read (only `ready_tasks`), so the snapshot's task list covers
    /// every `ready` task plus every task this instance currently has a
    /// live run or review for.
    pub async fn snapshot(&self) -> Result<ConsumeSnapshot, RuntimeError> {
        let mut tasks = self.store.ready_tasks().await?;
        let inflight_ids: Vec<TaskId> = self.inflight.lock().keys().cloned().collect();
        for id in inflight_ids {
            if let Ok(task) = self.store.get_task(&id).await {
                tasks.push(task);
            }
        }

        let config = EffectiveConfig {
            interval_seconds: self.config.interval.as_secs(),
            max_concurrent_per_agent: self.config.default_max_concurrent_per_agent,
            max_total_concurrent: self.config.max_total_concurrent,
        };

        Ok(SnapshotBuilder::build(
            &self.instance_id,
            self.state(),
            self.is_unhealthy(),
            self.clock.now_ms(),
            self.tick_counter.load(Ordering::Relaxed),
            &tasks,
            &self.epics.lock(),
            self.processes.running_processes(),
            self.health.get_all_health_status(),
            config,
            self.store.done_count().await?,
            self.store.blocked_count().await?,
            *self.browser.lock(),
        ))
    }

    async fn run_tick(&self) {
        match self.tick().await {
            Ok(()) => {
                self.consecutive_tick_failures.store(0, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(error = %err, "tick failed");
                let failures = self.consecutive_tick_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.config.pause_after_failures {
                    self.unhealthy.store(true, Ordering::Relaxed);
                    self.set_state(RunnerState::Paused);
                }
            }
        }
    }

    /// Drive the loop until `Stopped`, calling `publish` with the snapshot
    /// taken at the end of each tick. The tick sleep is cancelled
    /// immediately on any `pause`/`resume`/`request_shutdown` call — it
    /// never waits out a sleep to react to pause/shutdown.
    pub async fn run(self: &Arc<Self>, mut publish: impl FnMut(ConsumeSnapshot) + Send) {
        loop {
            if self.state() == RunnerState::Stopped {
                break;
            }
            self.run_tick().await;

            if self.state() == RunnerState::Draining && self.processes.running_count() == 0 {
                self.set_state(RunnerState::Stopped);
            }

            if let Ok(snapshot) = self.snapshot().await {
                publish(snapshot);
            }
            if self.state() == RunnerState::Stopped {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = self.wake.notified() => {}
            }
        }
    }

    /// Run exactly one tick then return, for `consume --once`.
    pub async fn run_once(&self) -> Result<ConsumeSnapshot, RuntimeError> {
        self.tick().await?;
        self.snapshot().await
    }

    /// Block until every owned process has been reaped, used by `shutdown`.
    pub async fn drain(&self) {
        self.processes.shutdown().await;
    }
}

#[cfg(test)]
#[path = "consume_tests.rs"]
mod tests;
