use std::time::{Duration, Instant};

use crate::prelude::*;

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn a_second_consume_refuses_to_start_while_one_is_running() {
    let project = Project::empty();

    let mut long_running = project
        .fuel()
        .args(&["consume", "--interval", "1"])
        .command()
        .spawn()
        .expect("first consume should spawn");

    assert!(
        wait_for(Duration::from_secs(2), || project.pidfile_path().exists()),
        "first instance never wrote a pidfile"
    );

    let second = project.fuel().args(&["consume", "--once"]).fails();
    assert_eq!(second.code(), Some(1));
    assert!(second.stderr().contains("already running"));

    long_running.kill().expect("kill first instance");
    let _ = long_running.wait();
}
