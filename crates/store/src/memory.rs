// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process reference implementation of [`TaskStore`].
//!
//! Stands in for the relational task board the runner treats as external:
//! it satisfies the same CAS-on-status-transition contract a real store
//! would, so `fuel-runtime::ConsumeLoop` can run end to end without a
//! database wired in. A non-test default rather than a test-only double.

use crate::error::StoreError;
use crate::store::{ReviewVerdict, RunFinalize, TaskStore};
use async_trait::async_trait;
use fuel_core::{
    AgentHealth, FailureType, Issue, Review, ReviewId, ReviewStatus, Run, RunId, RunStatus, Task,
    TaskId, TaskStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    runs: HashMap<RunId, Run>,
    reviews: HashMap<ReviewId, Review>,
    health: HashMap<String, AgentHealth>,
    next_numeric_id: u64,
    next_run_seq: u64,
    next_review_seq: u64,
}

/// An in-memory, mutex-guarded `TaskStore`. Safe to share across the
/// ConsumeLoop and the IPC server via `Arc`.
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seed a task directly, bypassing dispatch. Used by callers (tests, the
    /// `consume` CLI harness) to populate the board before running the loop.
    pub fn seed_task(&self, task: Task) {
        let mut inner = self.inner.lock();
        if task.numeric_id >= inner.next_numeric_id {
            inner.next_numeric_id = task.numeric_id + 1;
        }
        inner.tasks.insert(task.id.clone(), task);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn ready_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Ready)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at_ms.cmp(&b.created_at_ms))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task, StoreError> {
        self.inner
            .lock()
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
    }

    async fn transition_task(
        &self,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        if task.status != from {
            return Ok(false);
        }
        task.status = to;
        task.updated_at_ms = now_ms();
        Ok(true)
    }

    async fn create_run(
        &self,
        task_id: &TaskId,
        agent: &str,
        pid: u32,
        runner_instance_id: &str,
    ) -> Result<RunId, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_run_seq += 1;
        let run_id = RunId::new(format!("r-{:03}", inner.next_run_seq));
        let run = Run {
            id: run_id.clone(),
            task_id: task_id.clone(),
            agent: agent.to_string(),
            status: RunStatus::Running,
            started_at_ms: now_ms(),
            ended_at_ms: None,
            exit_code: None,
            session_id: None,
            model: None,
            cost_usd: None,
            pid: Some(pid),
            runner_instance_id: runner_instance_id.to_string().into(),
            error_type: None,
            output: None,
        };
        inner.runs.insert(run_id.clone(), run);
        Ok(run_id)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.inner
            .lock()
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    async fn finalize_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        fields: RunFinalize,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        run.status = status;
        run.ended_at_ms = Some(fields.ended_at_ms);
        run.exit_code = fields.exit_code;
        run.session_id = fields.session_id;
        run.model = fields.model;
        run.cost_usd = fields.cost_usd;
        run.error_type = fields.error_type;
        run.output = fields.output;
        Ok(())
    }

    async fn orphan_runs(&self, this_instance_id: &str) -> Result<Vec<RunId>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running && r.runner_instance_id.as_str() != this_instance_id)
            .map(|r| r.id.clone())
            .collect())
    }

    async fn mark_failed(&self, run_id: &RunId, reason: FailureType) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        run.status = RunStatus::Failed;
        run.ended_at_ms = Some(now_ms());
        run.error_type = Some(reason);
        Ok(())
    }

    async fn create_review(
        &self,
        task_id: &TaskId,
        original_status: TaskStatus,
        run_id: &RunId,
    ) -> Result<ReviewId, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_review_seq += 1;
        let review_id = ReviewId::new(format!("rv-{:03}", inner.next_review_seq));
        let review = Review {
            id: review_id.clone(),
            task_id: task_id.clone(),
            status: ReviewStatus::Running,
            original_status,
            issues: Vec::new(),
            run_id: run_id.clone(),
            started_at_ms: now_ms(),
            ended_at_ms: None,
        };
        inner.reviews.insert(review_id.clone(), review);
        Ok(review_id)
    }

    async fn get_review(&self, review_id: &ReviewId) -> Result<Review, StoreError> {
        self.inner
            .lock()
            .reviews
            .get(review_id)
            .cloned()
            .ok_or_else(|| StoreError::ReviewNotFound(review_id.to_string()))
    }

    async fn finalize_review(
        &self,
        review_id: &ReviewId,
        result: ReviewVerdict,
        issues: Vec<Issue>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let review = inner
            .reviews
            .get_mut(review_id)
            .ok_or_else(|| StoreError::ReviewNotFound(review_id.to_string()))?;
        review.status = match result {
            ReviewVerdict::Pass => ReviewStatus::Passed,
            ReviewVerdict::Fail => ReviewStatus::Failed,
        };
        review.issues = issues;
        review.ended_at_ms = Some(now_ms());
        Ok(())
    }

    async fn reviews_with_status(&self, status: ReviewStatus) -> Result<Vec<Review>, StoreError> {
        Ok(self
            .inner
            .lock()
            .reviews
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    async fn upsert_health(&self, health: AgentHealth) -> Result<(), StoreError> {
        self.inner
            .lock()
            .health
            .insert(health.agent.clone(), health);
        Ok(())
    }

    async fn read_health(&self, agent: &str) -> Result<Option<AgentHealth>, StoreError> {
        Ok(self.inner.lock().health.get(agent).cloned())
    }

    async fn read_all_health(&self) -> Result<Vec<AgentHealth>, StoreError> {
        Ok(self.inner.lock().health.values().cloned().collect())
    }

    async fn clear_health(&self, agent: &str) -> Result<(), StoreError> {
        self.inner.lock().health.remove(agent);
        Ok(())
    }

    async fn add_follow_up_task(
        &self,
        parent_task_id: &TaskId,
        title: &str,
        description: &str,
        labels: Vec<String>,
        blocked_by: Vec<TaskId>,
    ) -> Result<TaskId, StoreError> {
        let mut inner = self.inner.lock();
        let parent_priority = inner
            .tasks
            .get(parent_task_id)
            .map(|t| t.priority)
            .unwrap_or(10);
        inner.next_numeric_id += 1;
        let numeric_id = inner.next_numeric_id;
        let task_id = TaskId::new(format!("t-{:03}", numeric_id));
        let created_at_ms = now_ms();
        let task = Task {
            id: task_id.clone(),
            numeric_id,
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Ready,
            agent_preference: None,
            priority: parent_priority,
            complexity: fuel_core::Complexity::Simple,
            dependencies: Vec::new(),
            epic: None,
            labels,
            blocked_by,
            created_at_ms,
            updated_at_ms: created_at_ms,
        };
        inner.tasks.insert(task_id.clone(), task);
        Ok(task_id)
    }

    async fn done_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Done)
            .count() as u64)
    }

    async fn blocked_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Blocked)
            .count() as u64)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
