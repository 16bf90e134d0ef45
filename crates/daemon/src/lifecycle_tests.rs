// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    Config::load(dir.path().to_path_buf()).unwrap()
}

#[tokio::test]
async fn startup_binds_socket_and_writes_pidfile() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let result = startup(&config, "instance-1").await.unwrap();
    assert!(config.socket_path.exists());

    let body = read_pidfile(&config.pid_path).unwrap();
    assert_eq!(body.pid, std::process::id());
    assert_eq!(body.instance_id, "instance-1");
    assert!(body.socket_path.unwrap().ends_with("consume-runner.sock"));

    result.shutdown();
    assert!(!config.socket_path.exists());
    assert!(!config.pid_path.exists());
}

#[tokio::test]
async fn second_startup_against_a_live_lock_is_already_running() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let first = startup(&config, "instance-1").await.unwrap();

    let err = startup(&config, "instance-2").await.unwrap_err();
    match err {
        LifecycleError::AlreadyRunning { pid } => assert_eq!(pid, std::process::id()),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    // The live instance's pidfile and socket must survive the failed
    // second attempt untouched.
    assert!(config.socket_path.exists());
    assert!(read_pidfile(&config.pid_path).is_some());

    first.shutdown();
}

#[tokio::test]
async fn startup_after_clean_shutdown_succeeds_again() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let first = startup(&config, "instance-1").await.unwrap();
    first.shutdown();
    drop(first);

    let second = startup(&config, "instance-2").await.unwrap();
    let body = read_pidfile(&config.pid_path).unwrap();
    assert_eq!(body.instance_id, "instance-2");
    second.shutdown();
}

#[tokio::test]
async fn startup_removes_a_stale_socket_left_by_an_unclean_shutdown() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    std::fs::create_dir_all(&config.state_dir).unwrap();
    let stale = std::os::unix::net::UnixListener::bind(&config.socket_path).unwrap();
    drop(stale);
    assert!(config.socket_path.exists());

    let result = startup(&config, "instance-1").await.unwrap();
    assert!(config.socket_path.exists());
    result.shutdown();
}
