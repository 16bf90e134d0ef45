// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review entity: a second agent invocation that inspects a completed task's
//! diff and issues a pass/fail verdict.

use crate::run::RunId;
use crate::task::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Stable short id for a review.
    pub struct ReviewId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

/// The kind of problem a reviewer flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    UncommittedChanges,
    TestsFailing,
    Incomplete,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueType,
    pub description: String,
}

impl Issue {
    /// The issue filed when a reviewer's stdout has no parseable verdict.
    pub fn no_parseable_verdict() -> Self {
        Self {
            kind: IssueType::Other,
            description: "reviewer produced no parseable verdict".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub task_id: TaskId,
    pub status: ReviewStatus,
    /// The task's status at the moment review started, used to restore on
    /// failure.
    pub original_status: TaskStatus,
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub run_id: RunId,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
}

#[cfg(any(test, feature = "test-support"))]
impl Review {
    pub fn new_pending(
        id: impl Into<String>,
        task_id: impl Into<String>,
        original_status: TaskStatus,
        run_id: impl Into<String>,
        started_at_ms: u64,
    ) -> Self {
        Self {
            id: ReviewId::new(id),
            task_id: TaskId::new(task_id),
            status: ReviewStatus::Running,
            original_status,
            issues: Vec::new(),
            run_id: RunId::new(run_id),
            started_at_ms,
            ended_at_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
