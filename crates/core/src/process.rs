// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory process handle and exit classification.

use crate::run::FailureType;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};

/// What a spawned process represents. Review-triggered spawns go through the
/// same `ProcessManager` as task spawns but are tagged `Review` so the reap
/// path can route correctly without back-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Task,
    Review,
}

/// Read-only, serializable view of a live process, exposed to SnapshotBuilder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessView {
    pub task_id: TaskId,
    pub run_id: String,
    pub agent: String,
    pub pid: u32,
    pub process_type: ProcessType,
    pub started_at_ms: u64,
    pub last_output_at_ms: u64,
}

/// Terminal classification of a process exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExitClassification {
    Succeeded,
    FailedExit(i32),
    FailedSignal(i32),
    FailedTimeout,
    FailedSpawn,
}

impl ExitClassification {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitClassification::Succeeded)
    }

    /// Map an exit classification onto the `Run`/`Health` failure taxonomy.
    /// Returns `None` for a successful exit.
    pub fn as_failure_type(&self) -> Option<FailureType> {
        match self {
            ExitClassification::Succeeded => None,
            ExitClassification::FailedExit(_) => Some(FailureType::NonZeroExit),
            ExitClassification::FailedSignal(_) => Some(FailureType::KilledByUser),
            ExitClassification::FailedTimeout => Some(FailureType::Timeout),
            ExitClassification::FailedSpawn => Some(FailureType::SpawnFailed),
        }
    }
}

/// Result of a terminated process, produced by `ProcessManager::wait_for_any`
/// / `wait_for_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub task_id: TaskId,
    pub run_id: String,
    pub agent: String,
    pub process_type: ProcessType,
    pub classification: ExitClassification,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
