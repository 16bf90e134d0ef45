use crate::prelude::*;

#[test]
fn once_on_an_empty_project_prints_one_json_snapshot() {
    let project = Project::empty();

    let run = project
        .fuel()
        .args(&["consume", "--once", "--json"])
        .passes();

    let stdout = run.stdout();
    let snapshot: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("stdout should be one JSON object");

    assert_eq!(snapshot["state"], "running");
    assert_eq!(snapshot["tasks"].as_array().unwrap().len(), 0);
    assert_eq!(snapshot["unhealthy"], false);
    assert!(snapshot["instance_id"].is_string());
}

#[test]
fn once_without_json_prints_nothing_on_stdout() {
    let project = Project::empty();

    let run = project.fuel().args(&["consume", "--once"]).passes();
    assert_eq!(run.stdout(), "");
}

#[test]
fn once_cleans_up_the_pidfile_on_exit() {
    let project = Project::empty();
    project.fuel().args(&["consume", "--once"]).passes();
    assert!(!project.pidfile_path().exists());
}
