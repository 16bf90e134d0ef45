// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run entity: one execution attempt of a task or review by an agent.
//!

use crate::instance::InstanceId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Stable short id for a run, e.g. `r-001`.
    pub struct RunId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Classification of why a run failed. Mirrors `ProcessResult` exit
/// classification once folded into a persisted Run row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Timeout,
    SpawnFailed,
    NonZeroExit,
    DriverError,
    KilledByUser,
}

impl FailureType {
    /// Only `Timeout` and `NonZeroExit` count as recoverable for backoff-base
    /// purposes.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FailureType::Timeout | FailureType::NonZeroExit)
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureType::Timeout => "timeout",
            FailureType::SpawnFailed => "spawn_failed",
            FailureType::NonZeroExit => "non_zero_exit",
            FailureType::DriverError => "driver_error",
            FailureType::KilledByUser => "killed_by_user",
        };
        write!(f, "{s}")
    }
}

/// One execution attempt of a task (or a review) by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub task_id: TaskId,
    pub agent: String,
    pub status: RunStatus,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub runner_instance_id: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Run {
    /// A run is "live" iff it is `Running` and owned by `this_instance`: a
    /// task in `in_progress` or `review` has exactly one run row whose
    /// `runner_instance_id` equals the current process's instance id iff
    /// the run is `running`.
    pub fn is_live_for(&self, this_instance: &InstanceId) -> bool {
        self.status == RunStatus::Running && &self.runner_instance_id == this_instance
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct RunBuilder {
    id: RunId,
    task_id: TaskId,
    agent: String,
    status: RunStatus,
    started_at_ms: u64,
    ended_at_ms: Option<u64>,
    exit_code: Option<i32>,
    session_id: Option<String>,
    model: Option<String>,
    cost_usd: Option<f64>,
    pid: Option<u32>,
    runner_instance_id: InstanceId,
    error_type: Option<FailureType>,
    output: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RunBuilder {
    fn default() -> Self {
        Self {
            id: RunId::new("r-001"),
            task_id: TaskId::new("t-001"),
            agent: "claude".to_string(),
            status: RunStatus::Running,
            started_at_ms: 0,
            ended_at_ms: None,
            exit_code: None,
            session_id: None,
            model: None,
            cost_usd: None,
            pid: None,
            runner_instance_id: InstanceId::from("instance-1".to_string()),
            error_type: None,
            output: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RunBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.id = RunId::new(v.into());
        self
    }
    pub fn task_id(mut self, v: impl Into<String>) -> Self {
        self.task_id = TaskId::new(v.into());
        self
    }
    pub fn agent(mut self, v: impl Into<String>) -> Self {
        self.agent = v.into();
        self
    }
    pub fn status(mut self, v: RunStatus) -> Self {
        self.status = v;
        self
    }
    pub fn runner_instance_id(mut self, v: InstanceId) -> Self {
        self.runner_instance_id = v;
        self
    }
    pub fn error_type(mut self, v: FailureType) -> Self {
        self.error_type = Some(v);
        self
    }
    pub fn build(self) -> Run {
        Run {
            id: self.id,
            task_id: self.task_id,
            agent: self.agent,
            status: self.status,
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
            exit_code: self.exit_code,
            session_id: self.session_id,
            model: self.model,
            cost_usd: self.cost_usd,
            pid: self.pid,
            runner_instance_id: self.runner_instance_id,
            error_type: self.error_type,
            output: self.output,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Run {
    pub fn builder() -> RunBuilder {
        RunBuilder::default()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
