// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity consulted (not owned) by the core.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Stable short id for a task, e.g. `t-001`.
    pub struct TaskId;
}

crate::define_id! {
    /// Stable short id for an epic.
    pub struct EpicId;
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Ready,
    InProgress,
    Review,
    Blocked,
    Human,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Human => "human",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Rough estimate of how much work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Stable numeric id, assigned once at creation, never reused.
    pub numeric_id: u64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Preferred agent name; `None` means any available agent may take it.
    #[serde(default)]
    pub agent_preference: Option<String>,
    /// Lower value is higher priority.
    pub priority: i32,
    pub complexity: Complexity,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub epic: Option<EpicId>,
    /// Labels such as `review-fix`, used by follow-up tasks.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Task ids that must complete before this task may be dispatched.
    #[serde(default)]
    pub blocked_by: Vec<TaskId>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Task {
    pub fn is_dispatchable_status(&self) -> bool {
        matches!(self.status, TaskStatus::Ready)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct TaskBuilder {
    id: TaskId,
    numeric_id: u64,
    title: String,
    description: String,
    status: TaskStatus,
    agent_preference: Option<String>,
    priority: i32,
    complexity: Complexity,
    dependencies: Vec<TaskId>,
    epic: Option<EpicId>,
    labels: Vec<String>,
    blocked_by: Vec<TaskId>,
    created_at_ms: u64,
    updated_at_ms: u64,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            id: TaskId::new("t-001"),
            numeric_id: 1,
            title: "Example task".to_string(),
            description: String::new(),
            status: TaskStatus::Ready,
            agent_preference: None,
            priority: 10,
            complexity: Complexity::Simple,
            dependencies: Vec::new(),
            epic: None,
            labels: Vec::new(),
            blocked_by: Vec::new(),
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TaskBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.id = TaskId::new(v.into());
        self
    }
    pub fn numeric_id(mut self, v: u64) -> Self {
        self.numeric_id = v;
        self
    }
    pub fn title(mut self, v: impl Into<String>) -> Self {
        self.title = v.into();
        self
    }
    pub fn status(mut self, v: TaskStatus) -> Self {
        self.status = v;
        self
    }
    pub fn agent_preference(mut self, v: impl Into<String>) -> Self {
        self.agent_preference = Some(v.into());
        self
    }
    pub fn priority(mut self, v: i32) -> Self {
        self.priority = v;
        self
    }
    pub fn complexity(mut self, v: Complexity) -> Self {
        self.complexity = v;
        self
    }
    pub fn blocked_by(mut self, v: Vec<TaskId>) -> Self {
        self.blocked_by = v;
        self
    }
    pub fn labels(mut self, v: Vec<String>) -> Self {
        self.labels = v;
        self
    }
    pub fn created_at_ms(mut self, v: u64) -> Self {
        self.created_at_ms = v;
        self
    }
    pub fn build(self) -> Task {
        Task {
            id: self.id,
            numeric_id: self.numeric_id,
            title: self.title,
            description: self.description,
            status: self.status,
            agent_preference: self.agent_preference,
            priority: self.priority,
            complexity: self.complexity,
            dependencies: self.dependencies,
            epic: self.epic,
            labels: self.labels,
            blocked_by: self.blocked_by,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Task {
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
