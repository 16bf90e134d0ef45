// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn unparseable_verdict_is_other_typed() {
    let issue = Issue::no_parseable_verdict();
    assert_eq!(issue.kind, IssueType::Other);
    assert_eq!(issue.description, "reviewer produced no parseable verdict");
}

#[test]
fn new_pending_starts_running_with_no_issues() {
    let review = Review::new_pending("rv-1", "t-001", TaskStatus::Review, "r-001", 1_000);
    assert_eq!(review.status, ReviewStatus::Running);
    assert!(review.issues.is_empty());
    assert_eq!(review.original_status, TaskStatus::Review);
}

#[test]
fn issue_type_round_trips_through_json() {
    let issue = Issue {
        kind: IssueType::TestsFailing,
        description: "UserServiceTest::testCreate failed".to_string(),
    };
    let json = serde_json::to_string(&issue).unwrap();
    assert!(json.contains("\"tests_failing\""));
    let back: Issue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, issue);
}
