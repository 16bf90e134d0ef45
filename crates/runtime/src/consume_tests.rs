// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end `ConsumeLoop` scenarios.

use super::*;
use crate::health::RECOVERABLE_BASE_SECS;
use crate::process::{DEFAULT_MAX_RUNTIME, DEFAULT_RING_BUFFER_CAPACITY, DEFAULT_SHUTDOWN_GRACE};
use fuel_core::{FakeClock, Task, TaskStatus};
use fuel_drivers::{AgentDriver, AgentDriverRegistry, ParsedOutput};
use fuel_store::MemoryTaskStore;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// A driver that runs whatever shell script it is handed as the "prompt" —
/// lets each test script a task's and its reviewer's exact behavior without
/// a real agent binary.
struct ScriptDriver {
    name: String,
}

impl ScriptDriver {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AgentDriver for ScriptDriver {
    fn name(&self) -> &str {
        &self.name
    }
    fn command(&self) -> &str {
        "sh"
    }
    fn build_argv(&self, prompt: &str, _task: &Task) -> Vec<String> {
        vec!["-c".to_string(), prompt.to_string()]
    }
    fn parse_output(&self, _stdout: &str, _stderr: &str) -> ParsedOutput {
        ParsedOutput::default()
    }
}

/// Renders a task's dispatch "prompt" as the literal shell script stashed in
/// its description by test setup.
struct ScriptTaskPrompts;
impl TaskPromptBuilder for ScriptTaskPrompts {
    fn build(&self, task: &Task) -> String {
        task.description.clone()
    }
}

struct FakeDiffProvider;
impl crate::review::DiffProvider for FakeDiffProvider {
    fn diff(&self, _task: &Task) -> (String, String) {
        (String::new(), String::new())
    }
}

/// Review script per task id, defaulting to an unconditional pass.
struct ScriptReviewPrompts {
    scripts: parking_lot::Mutex<HashMap<TaskId, String>>,
}

impl ScriptReviewPrompts {
    fn new() -> Self {
        Self {
            scripts: parking_lot::Mutex::new(HashMap::new()),
        }
    }
    fn set(&self, task_id: &TaskId, script: impl Into<String>) {
        self.scripts.lock().insert(task_id.clone(), script.into());
    }
}

impl crate::review::ReviewPromptBuilder for ScriptReviewPrompts {
    fn build(&self, task: &Task, _diff: &str, _status: &str) -> String {
        self.scripts
            .lock()
            .get(&task.id)
            .cloned()
            .unwrap_or_else(|| "echo '{\"result\":\"pass\",\"issues\":[]}'".to_string())
    }
}

const PASS_VERDICT: &str = r#"echo '{"result":"pass","issues":[]}'"#;
const FAIL_VERDICT: &str = r#"echo '{"result":"fail","issues":[{"type":"tests_failing","description":"UserServiceTest::testCreate failed"}]}'"#;

struct Harness {
    store: Arc<MemoryTaskStore>,
    loop_: Arc<ConsumeLoop<FakeClock>>,
    review_scripts: Arc<ScriptReviewPrompts>,
    clock: FakeClock,
    _cwd: TempDir,
}

fn harness(agents: &[&str], config: ConsumeConfig) -> Harness {
    harness_with_processes(agents, config, Arc::new(ProcessManager::new()))
}

fn harness_with_processes(agents: &[&str], config: ConsumeConfig, processes: Arc<ProcessManager>) -> Harness {
    let memory = Arc::new(MemoryTaskStore::new());
    let store: Arc<dyn TaskStore> = memory.clone();
    let clock = FakeClock::new(0);
    let health = Arc::new(HealthTracker::new(clock.clone()));

    let mut registry = AgentDriverRegistry::empty();
    for agent in agents {
        registry.register(Arc::new(ScriptDriver::new(*agent)));
    }
    let drivers = Arc::new(registry);

    let review_scripts = Arc::new(ScriptReviewPrompts::new());
    let review = Arc::new(ReviewService::new(
        store.clone(),
        processes.clone(),
        drivers.clone(),
        Arc::new(FakeDiffProvider),
        review_scripts.clone(),
        "this-instance".to_string(),
    ));

    let cwd = TempDir::new().unwrap();
    let loop_ = Arc::new(ConsumeLoop::new(
        store,
        processes,
        health,
        drivers,
        review,
        Arc::new(ScriptTaskPrompts),
        clock.clone(),
        "this-instance",
        cwd.path().to_path_buf(),
        config,
    ));

    Harness {
        store: memory,
        loop_,
        review_scripts,
        clock,
        _cwd: cwd,
    }
}

fn seed_task(store: &MemoryTaskStore, id: &str, priority: i32, agent: &str, script: &str) -> TaskId {
    let task = Task::builder()
        .id(id)
        .agent_preference(agent)
        .priority(priority)
        .status(TaskStatus::Ready)
        .build();
    let mut task = task;
    task.description = script.to_string();
    store.seed_task(task);
    TaskId::new(id)
}

async fn tick_until(loop_: &ConsumeLoop<FakeClock>, max_ticks: u32, mut done: impl FnMut(&ConsumeSnapshot) -> bool) -> ConsumeSnapshot {
    for _ in 0..max_ticks {
        loop_.tick().await.unwrap();
        let snap = loop_.snapshot().await.unwrap();
        if done(&snap) {
            return snap;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    panic!("condition not reached within {max_ticks} ticks");
}

/// Ticks until `task_id`'s *persisted* status satisfies `pred`. A task that
/// reaches a terminal state and has no live process drops out of the
/// snapshot's task list entirely (`tasks` covers only `ready` + in-flight
/// tasks), so terminal-state waits must poll the store directly rather
/// than the snapshot.
async fn tick_until_task_status(
    loop_: &ConsumeLoop<FakeClock>,
    store: &MemoryTaskStore,
    task_id: &TaskId,
    max_ticks: u32,
    pred: impl Fn(TaskStatus) -> bool,
) -> Task {
    for _ in 0..max_ticks {
        loop_.tick().await.unwrap();
        let task = store.get_task(task_id).await.unwrap();
        if pred(task.status) {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    panic!("task {task_id} did not reach the expected status within {max_ticks} ticks");
}

/// E1 — happy path: one ready task, agent succeeds with no verdict JSON
/// (plain task run), reviewer passes. Task ends `done`, two succeeded runs,
/// health is clean.
#[tokio::test]
async fn e1_happy_path_task_then_passing_review_marks_done() {
    let h = harness(&["claude"], ConsumeConfig::default());
    h.loop_.start(|_| "claude".to_string()).await.unwrap();
    let task_id = seed_task(&h.store, "t-001", 1, "claude", "exit 0");
    h.review_scripts.set(&task_id, PASS_VERDICT);

    tick_until_task_status(&h.loop_, &h.store, &task_id, 40, |s| s == TaskStatus::Done).await;

    let snap = h.loop_.snapshot().await.unwrap();
    assert_eq!(snap.health.iter().find(|h| h.agent == "claude").unwrap().consecutive_failures, 0);
}

/// E2 — reviewer fails: task restored to its pre-review status, exactly one
/// follow-up task filed with `review-fix` label and `blocked_by` the parent.
#[tokio::test]
async fn e2_failing_review_restores_task_and_files_one_follow_up() {
    let h = harness(&["claude"], ConsumeConfig::default());
    h.loop_.start(|_| "claude".to_string()).await.unwrap();
    let task_id = seed_task(&h.store, "t-001", 1, "claude", "exit 0");
    h.review_scripts.set(&task_id, FAIL_VERDICT);

    // Wait for the task to leave `review` again, restored to its pre-review
    // status — `in_progress`, since a task only ever enters review from
    // there (the follow-up task, not a redispatch of t-001, is how the fix
    // actually happens).
    let task = tick_until_task_status(&h.loop_, &h.store, &task_id, 40, |s| s != TaskStatus::Review).await;
    assert_eq!(task.status, TaskStatus::InProgress);

    let follow_up = h
        .store
        .ready_tasks()
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.id != task_id)
        .expect("exactly one follow-up task should be filed");
    assert!(follow_up.labels.contains(&"review-fix".to_string()));
    assert!(follow_up.blocked_by.contains(&task_id));
    assert!(follow_up.title.contains(task_id.as_str()));
}

/// E3 — agent timeout: a silent process is killed, the run fails with
/// `timeout`, and backoff lands between 5s and ~7s (base 5s ± 25%) out.
#[tokio::test]
async fn e3_agent_timeout_records_failure_and_sets_backoff_window() {
    // A short idle timeout so the test doesn't need to wait 10 real minutes.
    let short_idle = Arc::new(ProcessManager::with_policy(
        DEFAULT_RING_BUFFER_CAPACITY,
        Duration::from_millis(150),
        DEFAULT_MAX_RUNTIME,
        DEFAULT_SHUTDOWN_GRACE,
    ));
    let mut config = ConsumeConfig::default();
    config.default_max_concurrent_per_agent = 1;
    let h = harness_with_processes(&["claude"], config, short_idle);
    h.loop_.start(|_| "claude".to_string()).await.unwrap();

    seed_task(&h.store, "t-002", 1, "claude", "sleep 30");

    let snap = tick_until(&h.loop_, 60, |s| {
        s.health.iter().any(|h| h.agent == "claude" && h.consecutive_failures == 1)
    })
    .await;

    let claude = snap.health.iter().find(|h| h.agent == "claude").unwrap();
    assert_eq!(claude.consecutive_failures, 1);
    assert!(claude.backoff_seconds_remaining > 0, "timeout failure should set a backoff window");
    assert!(
        claude.backoff_seconds_remaining <= RECOVERABLE_BASE_SECS * 2,
        "backoff should stay near the base for the first failure, got {}",
        claude.backoff_seconds_remaining
    );
}

/// E4 — two tasks, one agent, cap 1: lower-priority task dispatches only
/// after the first terminates; never two live `claude` processes at once.
#[tokio::test]
async fn e4_per_agent_cap_serializes_dispatch() {
    let mut config = ConsumeConfig::default();
    config.default_max_concurrent_per_agent = 1;
    let h = harness(&["claude"], config);
    h.loop_.start(|_| "claude".to_string()).await.unwrap();
    seed_task(&h.store, "t-003", 0, "claude", "sleep 0.3; exit 0");
    seed_task(&h.store, "t-004", 1, "claude", "exit 0");

    h.loop_.tick().await.unwrap();
    let snap = h.loop_.snapshot().await.unwrap();
    assert_eq!(snap.processes.len(), 1, "cap of 1 must keep only one claude process live");
    assert_eq!(snap.processes[0].task_id.as_str(), "t-003");

    tick_until(&h.loop_, 40, |s| {
        s.tasks
            .iter()
            .find(|t| t.id == "t-004")
            .map(|t| t.status != TaskStatus::Ready)
            .unwrap_or(false)
    })
    .await;
}

/// E5 — crash recovery: a prior instance's `running` row for a different
/// task, plus a `pending` review for another, are both reconciled at
/// startup and observable in the first snapshot after `start()`.
#[tokio::test]
async fn e5_startup_reconciles_orphaned_run_and_recovers_stuck_review() {
    let h = harness(&["claude"], ConsumeConfig::default());
    h.review_scripts.set(&TaskId::new("t-006"), PASS_VERDICT);

    // t-005: left `in_progress` with a run row owned by a prior instance.
    let orphaned_task = Task::builder().id("t-005").status(TaskStatus::InProgress).priority(5).build();
    h.store.seed_task(orphaned_task);
    let orphan_run = h.store.create_run(&TaskId::new("t-005"), "claude", 999, "old-instance").await.unwrap();

    // t-006: left `review` with a pending review row.
    let mut stuck_task = Task::builder().id("t-006").status(TaskStatus::Review).priority(5).build();
    stuck_task.description = "exit 0".to_string();
    h.store.seed_task(stuck_task);
    let old_run = h.store.create_run(&TaskId::new("t-006"), "claude", 998, "old-instance").await.unwrap();
    h.store
        .create_review(&TaskId::new("t-006"), TaskStatus::InProgress, &old_run)
        .await
        .unwrap();

    let report = h.loop_.start(|_task| "claude".to_string()).await.unwrap();
    // Both prior-instance `running` rows are orphans (t-005's task run and
    // t-006's stale review run); only t-005's is a task in `in_progress`.
    assert!(report.orphaned_runs.contains(&orphan_run));
    assert_eq!(report.recovered_reviews, vec![TaskId::new("t-006")]);

    let run = h.store.get_run(&orphan_run).await.unwrap();
    assert_eq!(run.status, fuel_core::RunStatus::Failed);
    let task5 = h.store.get_task(&TaskId::new("t-005")).await.unwrap();
    assert_eq!(task5.status, TaskStatus::Ready);

    let snap = h.loop_.snapshot().await.unwrap();
    assert!(snap.tasks.iter().any(|t| t.id == "t-005"));
    assert!(snap.tasks.iter().any(|t| t.id == "t-006"));

    tick_until_task_status(&h.loop_, &h.store, &TaskId::new("t-006"), 40, |s| s == TaskStatus::Done).await;
}

/// E6 — IPC pause/resume: a running task finishes normally while paused, no
/// new task is dispatched meanwhile, and dispatch resumes on `resume()`.
#[tokio::test]
async fn e6_pause_lets_running_task_finish_but_blocks_new_dispatch() {
    let mut config = ConsumeConfig::default();
    config.default_max_concurrent_per_agent = 2;
    let h = harness(&["claude"], config);
    seed_task(&h.store, "t-007", 0, "claude", "sleep 0.3; exit 0");

    h.loop_.start(|_| "claude".to_string()).await.unwrap();
    h.loop_.tick().await.unwrap();
    assert_eq!(h.loop_.state(), RunnerState::Running);
    assert!(h.loop_.snapshot().await.unwrap().processes.iter().any(|p| p.task_id.as_str() == "t-007"));

    h.loop_.pause();
    assert_eq!(h.loop_.state(), RunnerState::Paused);

    // A fresh task appears while paused; it must not be dispatched.
    seed_task(&h.store, "t-008", 1, "claude", "exit 0");
    for _ in 0..5 {
        h.loop_.tick().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let task8 = h.store.get_task(&TaskId::new("t-008")).await.unwrap();
    assert_eq!(task8.status, TaskStatus::Ready, "dispatch must not run while paused");

    // t-007 still reaps to completion even while paused.
    tick_until(&h.loop_, 40, |s| s.tasks.iter().any(|t| t.id == "t-007" && t.status != TaskStatus::InProgress)).await;

    h.loop_.resume();
    assert_eq!(h.loop_.state(), RunnerState::Running);
    tick_until(&h.loop_, 40, |s| {
        s.tasks.iter().any(|t| t.id == "t-008" && t.status != TaskStatus::Ready)
    })
    .await;
}

/// Invariant 2: per-agent concurrency cap is respected even with several
/// ready tasks and a cap of zero for one agent ("pauses that agent entirely
/// without affecting others", boundary behavior).
#[tokio::test]
async fn max_concurrent_zero_pauses_one_agent_without_affecting_others() {
    let mut config = ConsumeConfig::default();
    config.max_concurrent_per_agent.insert("claude".to_string(), 0);
    config.max_concurrent_per_agent.insert("cursor".to_string(), 1);
    let h = harness(&["claude", "cursor"], config);
    h.loop_.start(|_| "claude".to_string()).await.unwrap();
    seed_task(&h.store, "t-010", 0, "claude", "exit 0");
    seed_task(&h.store, "t-011", 1, "cursor", "exit 0");

    h.loop_.tick().await.unwrap();
    let snap = h.loop_.snapshot().await.unwrap();
    assert!(snap.processes.iter().all(|p| p.agent != "claude"));
    assert!(snap.processes.iter().any(|p| p.agent == "cursor"));
}

/// The snapshot's `tick` counter advances once per completed tick, so a
/// consumer can tell two snapshots apart even when nothing else changed.
#[tokio::test]
async fn snapshot_tick_increments_once_per_completed_tick() {
    let h = harness(&["claude"], ConsumeConfig::default());
    h.loop_.start(|_| "claude".to_string()).await.unwrap();

    let first = h.loop_.snapshot().await.unwrap();
    assert_eq!(first.tick, 0);

    h.loop_.tick().await.unwrap();
    let second = h.loop_.snapshot().await.unwrap();
    assert_eq!(second.tick, 1);

    h.loop_.tick().await.unwrap();
    let third = h.loop_.snapshot().await.unwrap();
    assert_eq!(third.tick, 2);
}
