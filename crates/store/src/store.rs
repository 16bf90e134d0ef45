// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TaskStore`: the minimum operations the core consumes from the external
//! relational task board. The board's own CRUD, schema, and
//! query compilation are out of scope — this trait is the seam.

use crate::error::StoreError;
use async_trait::async_trait;
use fuel_core::{
    AgentHealth, FailureType, Issue, Review, ReviewId, ReviewStatus, Run, RunId, Task, TaskId,
    TaskStatus,
};

/// Fields optionally updated by `finalize_run` on a terminal transition.
#[derive(Debug, Clone, Default)]
pub struct RunFinalize {
    pub exit_code: Option<i32>,
    pub ended_at_ms: u64,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub cost_usd: Option<f64>,
    pub error_type: Option<FailureType>,
    pub output: Option<String>,
}

/// The verdict a review finalizes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    Pass,
    Fail,
}

/// Transactional task/run/review/epic/health persistence.
///
/// Status transitions use compare-and-swap semantics
/// (`transition_task(task_id, from_status, to_status)`) so two runner
/// instances can never double-dispatch the same task.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks with status `Ready`, ordered by (priority asc, created_at asc).
    async fn ready_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Look up a single task by id.
    async fn get_task(&self, task_id: &TaskId) -> Result<Task, StoreError>;

    /// Atomic compare-and-swap on status. Returns `false` (not an error) if
    /// the task's current status does not match `from`.
    async fn transition_task(
        &self,
        task_id: &TaskId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<bool, StoreError>;

    async fn create_run(
        &self,
        task_id: &TaskId,
        agent: &str,
        pid: u32,
        runner_instance_id: &str,
    ) -> Result<RunId, StoreError>;

    async fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError>;

    async fn finalize_run(
        &self,
        run_id: &RunId,
        status: fuel_core::RunStatus,
        fields: RunFinalize,
    ) -> Result<(), StoreError>;

    /// Running rows belonging to an instance other than `this_instance_id`.
    async fn orphan_runs(&self, this_instance_id: &str) -> Result<Vec<RunId>, StoreError>;

    async fn mark_failed(&self, run_id: &RunId, reason: FailureType) -> Result<(), StoreError>;

    async fn create_review(
        &self,
        task_id: &TaskId,
        original_status: TaskStatus,
        run_id: &RunId,
    ) -> Result<ReviewId, StoreError>;

    async fn get_review(&self, review_id: &ReviewId) -> Result<Review, StoreError>;

    async fn finalize_review(
        &self,
        review_id: &ReviewId,
        result: ReviewVerdict,
        issues: Vec<Issue>,
    ) -> Result<(), StoreError>;

    /// Reviews still `Pending` or `Running`, used by `recover_stuck_reviews`
    /// to find reviews orphaned by a prior crash.
    async fn reviews_with_status(&self, status: ReviewStatus) -> Result<Vec<Review>, StoreError>;

    async fn upsert_health(&self, health: AgentHealth) -> Result<(), StoreError>;

    async fn read_health(&self, agent: &str) -> Result<Option<AgentHealth>, StoreError>;

    async fn read_all_health(&self) -> Result<Vec<AgentHealth>, StoreError>;

    async fn clear_health(&self, agent: &str) -> Result<(), StoreError>;

    #[allow(clippy::too_many_arguments)]
    async fn add_follow_up_task(
        &self,
        parent_task_id: &TaskId,
        title: &str,
        description: &str,
        labels: Vec<String>,
        blocked_by: Vec<TaskId>,
    ) -> Result<TaskId, StoreError>;

    /// Count of tasks whose status is `Done`, used by SnapshotBuilder.
    async fn done_count(&self) -> Result<u64, StoreError>;

    /// Count of tasks whose status is `Blocked`, used by SnapshotBuilder.
    async fn blocked_count(&self) -> Result<u64, StoreError>;
}
