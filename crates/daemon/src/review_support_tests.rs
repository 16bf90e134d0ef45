// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fuel_core::Task;
use fuel_runtime::DiffProvider;

fn task() -> Task {
    Task::builder().id("t-1").title("fix the thing").build()
}

#[test]
fn task_prompt_mentions_id_and_title() {
    let prompt = SimpleTaskPromptBuilder.build(&task());
    assert!(prompt.contains("t-1"));
    assert!(prompt.contains("fix the thing"));
}

#[test]
fn review_prompt_embeds_diff_and_status_and_asks_for_verdict_json() {
    let prompt = SimpleReviewPromptBuilder.build(&task(), "+hello", "M file.rs");
    assert!(prompt.contains("+hello"));
    assert!(prompt.contains("M file.rs"));
    assert!(prompt.contains("\"result\""));
}

#[test]
fn agent_for_prefers_task_preference_over_default() {
    let mut t = task();
    t.agent_preference = Some("cursor".to_string());
    assert_eq!(agent_for(&t, "claude"), "cursor");

    let t = task();
    assert_eq!(agent_for(&t, "claude"), "claude");
}

#[test]
fn git_diff_provider_is_best_effort_outside_a_repo() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = GitDiffProvider::new(dir.path().to_path_buf());
    // A non-repo cwd yields empty strings rather than a panic or error.
    let (diff, status) = provider.diff(&task());
    assert_eq!(diff, "");
    assert_eq!(status, "");
}
