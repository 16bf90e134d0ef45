// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SnapshotBuilder`: assembles a frozen [`ConsumeSnapshot`] from the board,
//! live processes, health table, and runner state.

use fuel_core::{AgentHealthSummary, Complexity, Epic, ProcessView, Task, TaskStatus};
use serde::{Deserialize, Serialize};

/// The `ConsumeLoop` state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Starting,
    Running,
    Paused,
    Draining,
    Stopped,
}

/// Effective dispatch configuration surfaced in the snapshot, independent of
/// how it was sourced (flags, env, defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub interval_seconds: u64,
    pub max_concurrent_per_agent: u32,
    pub max_total_concurrent: u32,
}

/// Scalar-only view of a [`Task`] for the snapshot — never the dependency
/// graph or epic object, just a flattened `epic_short_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub numeric_id: u64,
    pub title: String,
    pub status: TaskStatus,
    pub agent_preference: Option<String>,
    pub priority: i32,
    pub complexity: Complexity,
    pub epic_short_id: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl TaskSummary {
    fn from_task(task: &Task, epics: &[Epic]) -> Self {
        let epic_short_id = task
            .epic
            .as_ref()
            .and_then(|epic_id| epics.iter().find(|e| &e.id == epic_id))
            .map(|e| e.id.as_str().to_string());
        Self {
            id: task.id.as_str().to_string(),
            numeric_id: task.numeric_id,
            title: task.title.clone(),
            status: task.status,
            agent_preference: task.agent_preference.clone(),
            priority: task.priority,
            complexity: task.complexity,
            epic_short_id,
            created_at_ms: task.created_at_ms,
            updated_at_ms: task.updated_at_ms,
        }
    }
}

/// Opaque status of the embedded browser-automation daemon: the runner
/// ferries `browser.*` IPC requests to it without understanding its
/// payloads, so all the snapshot carries is liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserDaemonStatus {
    pub connected: bool,
}

/// Immutable description of the runner's state at one instant. Safe to
/// serialize over IPC or to disk; round-trips through JSON to an equal
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeSnapshot {
    pub instance_id: String,
    pub state: RunnerState,
    pub unhealthy: bool,
    pub taken_at_ms: u64,
    /// Monotonically increasing per-instance tick counter, so a consumer
    /// (`fuel-cli status`) can tell a stale cached snapshot from a fresh one.
    pub tick: u64,
    pub tasks: Vec<TaskSummary>,
    pub processes: Vec<ProcessView>,
    pub health: Vec<AgentHealthSummary>,
    pub config: EffectiveConfig,
    pub epics: Vec<Epic>,
    pub done_count: u64,
    pub blocked_count: u64,
    pub browser: BrowserDaemonStatus,
}

/// Collects a consistent view under each owning component's lock, then
/// assembles the immutable snapshot outside any of them: construction
/// stays lock-free over live data.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        instance_id: &str,
        state: RunnerState,
        unhealthy: bool,
        taken_at_ms: u64,
        tick: u64,
        tasks: &[Task],
        epics: &[Epic],
        processes: Vec<ProcessView>,
        health: Vec<AgentHealthSummary>,
        config: EffectiveConfig,
        done_count: u64,
        blocked_count: u64,
        browser: BrowserDaemonStatus,
    ) -> ConsumeSnapshot {
        let tasks = tasks.iter().map(|t| TaskSummary::from_task(t, epics)).collect();
        ConsumeSnapshot {
            instance_id: instance_id.to_string(),
            state,
            unhealthy,
            taken_at_ms,
            tick,
            tasks,
            processes,
            health,
            config,
            epics: epics.to_vec(),
            done_count,
            blocked_count,
            browser,
        }
    }
}

/// A task counts toward "active" display if it hasn't reached a terminal or
/// blocked-on-human state.
pub fn is_active(status: TaskStatus) -> bool {
    !matches!(status, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Human)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
