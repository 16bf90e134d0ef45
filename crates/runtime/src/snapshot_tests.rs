// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fuel_core::{Complexity, EpicId, Task, TaskStatus};

fn config() -> EffectiveConfig {
    EffectiveConfig {
        interval_seconds: 5,
        max_concurrent_per_agent: 2,
        max_total_concurrent: 8,
    }
}

#[test]
fn build_flattens_epic_short_id_from_task_epic_reference() {
    let epic = Epic {
        id: EpicId::new("e-1"),
        name: "Migration".to_string(),
    };
    let task = Task::builder().id("t-1").status(TaskStatus::Ready).build();
    let mut task = task;
    task.epic = Some(epic.id.clone());

    let snapshot = SnapshotBuilder::build(
        "instance-a",
        RunnerState::Running,
        false,
        1_000,
        5,
        &[task],
        &[epic.clone()],
        vec![],
        vec![],
        config(),
        0,
        0,
        BrowserDaemonStatus { connected: false },
    );

    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].epic_short_id.as_deref(), Some("e-1"));
}

#[test]
fn build_leaves_epic_short_id_none_when_task_has_no_epic() {
    let task = Task::builder().id("t-2").build();
    let snapshot = SnapshotBuilder::build(
        "instance-a",
        RunnerState::Running,
        false,
        1_000,
        5,
        &[task],
        &[],
        vec![],
        vec![],
        config(),
        0,
        0,
        BrowserDaemonStatus { connected: false },
    );
    assert_eq!(snapshot.tasks[0].epic_short_id, None);
}

#[test]
fn is_active_excludes_done_failed_and_human() {
    assert!(!is_active(TaskStatus::Done));
    assert!(!is_active(TaskStatus::Failed));
    assert!(!is_active(TaskStatus::Human));
    assert!(is_active(TaskStatus::Ready));
    assert!(is_active(TaskStatus::InProgress));
    assert!(is_active(TaskStatus::Review));
    assert!(is_active(TaskStatus::Blocked));
}

#[test]
fn snapshot_round_trips_through_json_to_an_equal_value() {
    let task = Task::builder().id("t-3").complexity(Complexity::Complex).build();
    let snapshot = SnapshotBuilder::build(
        "instance-b",
        RunnerState::Paused,
        true,
        2_000,
        9,
        &[task],
        &[],
        vec![],
        vec![],
        config(),
        3,
        1,
        BrowserDaemonStatus { connected: true },
    );

    let json = serde_json::to_string(&snapshot).unwrap();
    let round_tripped: ConsumeSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snapshot, round_tripped);
}

#[test]
fn build_carries_counters_and_browser_status_through_unchanged() {
    let snapshot = SnapshotBuilder::build(
        "instance-c",
        RunnerState::Draining,
        false,
        3_000,
        12,
        &[],
        &[],
        vec![],
        vec![],
        config(),
        42,
        7,
        BrowserDaemonStatus { connected: true },
    );
    assert_eq!(snapshot.done_count, 42);
    assert_eq!(snapshot.blocked_count, 7);
    assert!(snapshot.browser.connected);
    assert_eq!(snapshot.state, RunnerState::Draining);
    assert_eq!(snapshot.tick, 12);
}
