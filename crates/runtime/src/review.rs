// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ReviewService`: turns a just-succeeded task into a review run, parses
//! the reviewer's verdict, and persists the result.

use crate::error::RuntimeError;
use crate::process::ProcessManager;
use fuel_core::{Issue, IssueType, ProcessType, Task, TaskId, TaskStatus};
use fuel_drivers::AgentDriverRegistry;
use fuel_store::{ReviewVerdict, RunFinalize, TaskStore};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Character budget for a diff embedded in a review prompt.
pub const DIFF_TRUNCATE_LIMIT: usize = 5_000;

/// Truncate `diff` to [`DIFF_TRUNCATE_LIMIT`] characters, preferring to cut
/// at the last newline within the final 20% of the budget so a hunk header
/// isn't severed mid-line. Appends a `[TRUNCATED: N more characters]` marker
/// when truncation occurs.
pub fn truncate_diff(diff: &str) -> String {
    let chars: Vec<char> = diff.chars().collect();
    if chars.len() <= DIFF_TRUNCATE_LIMIT {
        return diff.to_string();
    }
    let window_start = (DIFF_TRUNCATE_LIMIT as f64 * 0.8) as usize;
    let mut cut = DIFF_TRUNCATE_LIMIT;
    for i in (window_start..DIFF_TRUNCATE_LIMIT).rev() {
        if chars[i] == '\n' {
            cut = i;
            break;
        }
    }
    let kept: String = chars[..cut].iter().collect();
    let remaining = chars.len() - cut;
    format!("{kept}\n[TRUNCATED: {remaining} more characters]")
}

/// Git plumbing is an external collaborator: the runner only
/// consults it for the diff/status text embedded in a review prompt.
pub trait DiffProvider: Send + Sync {
    /// Returns `(diff, status)` for `task`'s working tree.
    fn diff(&self, task: &Task) -> (String, String);
}

/// The prompt-template renderer is an external collaborator;
/// this is the seam `ReviewService` calls through to build a reviewer
/// prompt from a task and its (already truncated) diff/status.
pub trait ReviewPromptBuilder: Send + Sync {
    fn build(&self, task: &Task, diff: &str, status: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(rename = "type")]
    kind: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    result: String,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

fn issue_type_from_str(s: &str) -> IssueType {
    match s {
        "uncommitted_changes" => IssueType::UncommittedChanges,
        "tests_failing" => IssueType::TestsFailing,
        "incomplete" => IssueType::Incomplete,
        _ => IssueType::Other,
    }
}

/// Scan `stdout` for every syntactically balanced top-level `{...}` object,
/// respecting quoted strings so braces inside descriptions don't confuse
/// the scan, and return them in the order they appear.
fn candidate_objects(stdout: &str) -> Vec<String> {
    let chars: Vec<char> = stdout.chars().collect();
    let mut objects = Vec::new();
    let mut depth = 0i32;
    let mut start = None;
    let mut in_string = false;
    let mut escape = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start {
                            objects.push(chars[s..=i].iter().collect());
                        }
                        start = None;
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

/// Result of parsing a reviewer's stdout for its verdict.
pub struct ParsedVerdict {
    pub verdict: ReviewVerdict,
    pub issues: Vec<Issue>,
}

/// Scan `stdout` for the **last** JSON object matching
/// `{"result":"pass"|"fail","issues":[...]}`. A parse failure (no matching
/// object anywhere) degrades to `Fail` with a single `other`-typed issue.
pub fn parse_reviewer_verdict(stdout: &str) -> ParsedVerdict {
    let found = candidate_objects(stdout).into_iter().rev().find_map(|candidate| {
        let raw: RawVerdict = serde_json::from_str(&candidate).ok()?;
        if raw.result == "pass" || raw.result == "fail" {
            Some(raw)
        } else {
            None
        }
    });

    match found {
        Some(raw) => {
            let verdict = if raw.result == "pass" {
                ReviewVerdict::Pass
            } else {
                ReviewVerdict::Fail
            };
            let issues = raw
                .issues
                .into_iter()
                .map(|i| Issue {
                    kind: issue_type_from_str(&i.kind),
                    description: i.description,
                })
                .collect();
            ParsedVerdict { verdict, issues }
        }
        None => ParsedVerdict {
            verdict: ReviewVerdict::Fail,
            issues: vec![Issue::no_parseable_verdict()],
        },
    }
}

/// Outcome of processing a reviewer's reap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Task moved to `done`.
    Passed,
    /// Task restored to `original_status`; `follow_ups` lists the ids of the
    /// filed `review-fix` tasks, one per issue.
    Failed { follow_ups: Vec<TaskId> },
}

/// Builds review prompts, spawns reviewer processes, and routes their
/// verdicts. Holds no owned tasks of its own: every method
/// executes on the caller's task, typically `ConsumeLoop`'s.
pub struct ReviewService {
    store: Arc<dyn TaskStore>,
    processes: Arc<ProcessManager>,
    drivers: Arc<AgentDriverRegistry>,
    diff_provider: Arc<dyn DiffProvider>,
    prompt_builder: Arc<dyn ReviewPromptBuilder>,
    instance_id: String,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        processes: Arc<ProcessManager>,
        drivers: Arc<AgentDriverRegistry>,
        diff_provider: Arc<dyn DiffProvider>,
        prompt_builder: Arc<dyn ReviewPromptBuilder>,
        instance_id: String,
    ) -> Self {
        Self {
            store,
            processes,
            drivers,
            diff_provider,
            prompt_builder,
            instance_id,
        }
    }

    /// Transition `task` into `review`, build and spawn a reviewer. Returns
    /// once the reviewer process is live, carrying the run id the caller
    /// needs to finalize that run at reap time; the review itself runs
    /// concurrently with further dispatch. Returns `None`
    /// if the task lost the transition race (another instance already moved
    /// it) — the caller's view of `task` is stale, nothing to do.
    pub async fn trigger_review(
        &self,
        task: &Task,
        agent: &str,
        cwd: &Path,
    ) -> Result<Option<fuel_core::RunId>, RuntimeError> {
        let original_status = task.status;
        let transitioned = self
            .store
            .transition_task(&task.id, original_status, TaskStatus::Review)
            .await?;
        if !transitioned {
            return Ok(None);
        }

        let (diff, status) = self.diff_provider.diff(task);
        let diff = truncate_diff(&diff);
        let prompt = self.prompt_builder.build(task, &diff, &status);

        let driver = self.drivers.driver_for(agent, None)?;
        let argv = driver.build_argv(&prompt, task);

        let view = self
            .processes
            .spawn(task.id.clone(), "pending", agent, driver.command(), &argv, cwd, ProcessType::Review)?;

        let run_id = self
            .store
            .create_run(&task.id, agent, view.pid, &self.instance_id)
            .await?;
        self.store
            .create_review(&task.id, original_status, &run_id)
            .await?;
        Ok(Some(run_id))
    }

    /// Route a reviewer's terminal `ProcessResult` to a pass/fail verdict,
    /// finalizing the run and review rows and, on failure, filing one
    /// follow-up task per issue.
    pub async fn complete_review(
        &self,
        task_id: &TaskId,
        run_id: &fuel_core::RunId,
        stdout: &str,
        exit_succeeded: bool,
    ) -> Result<ReviewOutcome, RuntimeError> {
        let task = self.store.get_task(task_id).await?;
        let reviews = self.store.reviews_with_status(fuel_core::ReviewStatus::Running).await?;
        let review = reviews
            .into_iter()
            .find(|r| &r.run_id == run_id)
            .ok_or_else(|| RuntimeError::ProcessNotFound(task_id.to_string()))?;

        let parsed = if exit_succeeded {
            parse_reviewer_verdict(stdout)
        } else {
            ParsedVerdict {
                verdict: ReviewVerdict::Fail,
                issues: vec![Issue::no_parseable_verdict()],
            }
        };

        self.store
            .finalize_review(&review.id, parsed.verdict, parsed.issues.clone())
            .await?;

        match parsed.verdict {
            ReviewVerdict::Pass => {
                self.store
                    .transition_task(task_id, TaskStatus::Review, TaskStatus::Done)
                    .await?;
                Ok(ReviewOutcome::Passed)
            }
            ReviewVerdict::Fail => {
                self.store
                    .transition_task(task_id, TaskStatus::Review, review.original_status)
                    .await?;
                let mut follow_ups = Vec::with_capacity(parsed.issues.len());
                for issue in &parsed.issues {
                    let title = format!("review-fix for {}: {}", task.id, issue.description);
                    let id = self
                        .store
                        .add_follow_up_task(
                            task_id,
                            &title,
                            &issue.description,
                            vec!["review-fix".to_string()],
                            vec![task_id.clone()],
                        )
                        .await?;
                    follow_ups.push(id);
                }
                Ok(ReviewOutcome::Failed { follow_ups })
            }
        }
    }

    /// Re-trigger reviews orphaned by a prior crash: tasks in `review`
    /// status with no live process in this instance, whose review row is
    /// `pending`/`running` under a different instance.
    /// Returns the recovered task ids. Called once at `ConsumeLoop` startup.
    pub async fn recover_stuck_reviews(&self, agent_for: impl Fn(&Task) -> String, cwd: &Path) -> Result<Vec<TaskId>, RuntimeError> {
        let mut recovered = Vec::new();
        let mut stuck = self.store.reviews_with_status(fuel_core::ReviewStatus::Pending).await?;
        stuck.extend(self.store.reviews_with_status(fuel_core::ReviewStatus::Running).await?);

        for review in stuck {
            if self.processes.is_running(&review.task_id) {
                continue;
            }
            let task = match self.store.get_task(&review.task_id).await {
                Ok(t) if t.status == TaskStatus::Review => t,
                _ => continue,
            };
            let agent = agent_for(&task);
            // `trigger_review` expects the task's live status to match what
            // it will CAS away from; a recovered review restarts from
            // `review` itself rather than from `original_status`, so we
            // restore to `original_status` first and let trigger_review
            // redo the same CAS a fresh dispatch would have done.
            self.store
                .transition_task(&task.id, TaskStatus::Review, review.original_status)
                .await?;
            let mut task = task;
            task.status = review.original_status;
            if matches!(self.trigger_review(&task, &agent, cwd).await, Ok(Some(_))) {
                recovered.push(task.id.clone());
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
