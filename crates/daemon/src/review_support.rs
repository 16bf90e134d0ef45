// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete implementations of the seams `fuel-runtime` leaves external:
//! git plumbing for review diffs, and the prompt text handed to a
//! dispatched or reviewing agent. The prompt-template renderer itself is
//! out of scope as a templating system — this is just the minimal
//! rendering the runner needs to actually invoke an agent.

use fuel_core::Task;
use fuel_runtime::{ReviewPromptBuilder, TaskPromptBuilder};
use std::path::PathBuf;
use std::process::Command;

/// Shells out to `git diff`/`git status` in the task's working tree.
/// Best-effort: a non-repo cwd or missing `git` binary yields empty output
/// rather than failing the review — the diff is context for the reviewer
/// prompt, not a precondition for reviewing.
pub struct GitDiffProvider {
    cwd: PathBuf,
}

impl GitDiffProvider {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    fn run(&self, args: &[&str]) -> String {
        Command::new("git")
            .args(args)
            .current_dir(&self.cwd)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
            .unwrap_or_default()
    }
}

impl fuel_runtime::DiffProvider for GitDiffProvider {
    fn diff(&self, _task: &Task) -> (String, String) {
        let diff = self.run(&["diff", "HEAD"]);
        let status = self.run(&["status", "--short"]);
        (diff, status)
    }
}

/// Renders the prompt for a freshly-dispatched task.
pub struct SimpleTaskPromptBuilder;

impl TaskPromptBuilder for SimpleTaskPromptBuilder {
    fn build(&self, task: &Task) -> String {
        format!(
            "You are working on task {} ({:?}).\n\nTitle: {}\nDescription:\n{}\n\nComplete this task, then stop.",
            task.id,
            task.complexity,
            task.title,
            task.description,
        )
    }
}

/// Renders the prompt for a reviewer, instructing it to terminate with the
/// verdict JSON `fuel_runtime::parse_reviewer_verdict` scans stdout for.
pub struct SimpleReviewPromptBuilder;

impl ReviewPromptBuilder for SimpleReviewPromptBuilder {
    fn build(&self, task: &Task, diff: &str, status: &str) -> String {
        format!(
            "Review the changes made for task {} ({}).\n\n\
             Task description:\n{}\n\n\
             Git status:\n{}\n\n\
             Git diff:\n{}\n\n\
             Check for uncommitted changes, failing tests, and incomplete work. \
             Terminate your output with a single JSON object on its own line of \
             the shape: {{\"result\":\"pass\"|\"fail\",\"issues\":[{{\"type\":\"uncommitted_changes\"|\"tests_failing\"|\"incomplete\"|\"other\",\"description\":\"...\"}}]}}",
            task.id, task.title, task.description, status, diff,
        )
    }
}

/// Resolve a task's dispatch agent for review recovery: the task's stated
/// preference, else the runner's configured default.
pub fn agent_for(task: &Task, default_agent: &str) -> String {
    task.agent_preference.clone().unwrap_or_else(|| default_agent.to_string())
}

#[cfg(test)]
#[path = "review_support_tests.rs"]
mod tests;
