// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fuel_core::{FakeClock, Task};
use fuel_drivers::AgentDriverRegistry;
use fuel_runtime::{ConsumeConfig, HealthTracker, ReviewService, TaskPromptBuilder};
use fuel_store::MemoryTaskStore;
use tempfile::TempDir;
use tokio::net::UnixStream;

struct EmptyPrompts;
impl TaskPromptBuilder for EmptyPrompts {
    fn build(&self, _task: &Task) -> String {
        String::new()
    }
}

struct EmptyDiffs;
impl fuel_runtime::DiffProvider for EmptyDiffs {
    fn diff(&self, _task: &Task) -> (String, String) {
        (String::new(), String::new())
    }
}

struct EmptyReviewPrompts;
impl fuel_runtime::ReviewPromptBuilder for EmptyReviewPrompts {
    fn build(&self, _task: &Task, _diff: &str, _status: &str) -> String {
        String::new()
    }
}

/// Build a `ListenCtx` wired to a fresh in-memory board, no registered
/// drivers, and a `FakeClock` — enough surface to dispatch every request
/// type the protocol accepts without touching a real agent binary.
async fn ctx() -> (Arc<ListenCtx<FakeClock>>, TempDir) {
    let store: Arc<dyn fuel_store::TaskStore> = Arc::new(MemoryTaskStore::new());
    let processes = Arc::new(ProcessManager::new());
    let clock = FakeClock::new(0);
    let health = Arc::new(HealthTracker::new(clock.clone()));
    let drivers = Arc::new(AgentDriverRegistry::empty());
    let review = Arc::new(ReviewService::new(
        store.clone(),
        processes.clone(),
        drivers.clone(),
        Arc::new(EmptyDiffs),
        Arc::new(EmptyReviewPrompts),
        "test-instance".to_string(),
    ));
    let cwd = TempDir::new().unwrap();

    let run = Arc::new(ConsumeLoop::new(
        store,
        processes.clone(),
        health,
        drivers,
        review,
        Arc::new(EmptyPrompts),
        clock,
        "test-instance",
        cwd.path().to_path_buf(),
        ConsumeConfig::default(),
    ));
    run.start(|_task| "claude".to_string()).await.unwrap();

    let (snapshots, _) = broadcast::channel(8);
    let ctx = Arc::new(ListenCtx {
        run,
        processes,
        snapshots,
        shutdown: Arc::new(Notify::new()),
    });
    (ctx, cwd)
}

async fn roundtrip(stream: &mut UnixStream, request: Request) -> Response {
    let bytes = protocol_wire::encode(&request).unwrap();
    protocol_wire::write_message(stream, &bytes).await.unwrap();
    let reply = protocol_wire::read_message(stream).await.unwrap();
    protocol_wire::decode(&reply).unwrap()
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    assert_eq!(roundtrip(&mut client, Request::Ping).await, Response::Pong);
    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn hello_replies_with_the_protocol_version() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    let response = roundtrip(
        &mut client,
        Request::Hello {
            version: "anything".to_string(),
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Hello {
            version: protocol_wire::PROTOCOL_VERSION.to_string()
        }
    );
    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn pause_then_resume_round_trips_through_the_run_loop_state() {
    let (ctx, _cwd) = ctx().await;
    let run = ctx.run.clone();
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    assert_eq!(run.state(), RunnerState::Running);
    assert_eq!(roundtrip(&mut client, Request::Pause).await, Response::Ok);
    assert_eq!(run.state(), RunnerState::Paused);
    assert_eq!(roundtrip(&mut client, Request::Resume).await, Response::Ok);
    assert_eq!(run.state(), RunnerState::Running);

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn status_reports_the_live_state_label() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    match roundtrip(&mut client, Request::Status).await {
        Response::Status { state, unhealthy, .. } => {
            assert_eq!(state, "running");
            assert!(!unhealthy);
        }
        other => panic!("expected Status, got {other:?}"),
    }

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn snapshot_request_round_trips_through_serialization() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    match roundtrip(&mut client, Request::Snapshot).await {
        Response::Snapshot(snapshot) => {
            assert_eq!(snapshot.instance_id, "test-instance");
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn logs_for_an_unknown_task_is_a_typed_error() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    match roundtrip(
        &mut client,
        Request::Logs {
            task_id: "nope".to_string(),
        },
    )
    .await
    {
        Response::Error { code, .. } => assert_eq!(code, "no_live_process"),
        other => panic!("expected Error, got {other:?}"),
    }

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn browser_requests_without_an_attached_daemon_are_an_error() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    match roundtrip(
        &mut client,
        Request::Browser {
            method: "click".to_string(),
            payload: serde_json::Value::Null,
        },
    )
    .await
    {
        Response::Error { code, .. } => assert_eq!(code, "browser_unavailable"),
        other => panic!("expected Error, got {other:?}"),
    }

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn mute_stops_unsolicited_snapshot_broadcasts() {
    let (ctx, _cwd) = ctx().await;
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx.clone()));

    // A request/reply round trip first guarantees the connection task has
    // reached its subscribe-then-loop point before we publish, so the
    // broadcast below isn't racing the subscriber's startup.
    assert_eq!(roundtrip(&mut client, Request::Ping).await, Response::Pong);

    let snapshot = ctx.run.snapshot().await.unwrap();
    let _ = ctx.snapshots.send(snapshot.clone());
    match protocol_wire::decode(&protocol_wire::read_message(&mut client).await.unwrap()).unwrap() {
        Response::SnapshotUpdate(boxed) => assert_eq!(boxed.instance_id, "test-instance"),
        other => panic!("expected SnapshotUpdate, got {other:?}"),
    }

    assert_eq!(roundtrip(&mut client, Request::Mute).await, Response::Ok);

    let _ = ctx.snapshots.send(snapshot);
    // The next frame on the wire must be this Ping's Pong, not a stray
    // SnapshotUpdate, proving the broadcast stopped once muted.
    assert_eq!(roundtrip(&mut client, Request::Ping).await, Response::Pong);

    drop(client);
    conn.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_drains_to_stopped_before_replying() {
    let (ctx, _cwd) = ctx().await;
    let run = ctx.run.clone();
    let (mut client, server) = UnixStream::pair().unwrap();
    let conn = tokio::spawn(handle_connection(server, ctx));

    // `request_shutdown` only flips the state to `Draining`; it's the tick
    // loop itself that notices `Draining` with nothing left running and
    // advances to `Stopped`, same as the real host wires it in `host.rs`.
    let run_for_ticks = run.clone();
    let tick_task = tokio::spawn(async move { run_for_ticks.run(|_| {}).await });

    assert_eq!(roundtrip(&mut client, Request::Shutdown).await, Response::ShuttingDown);
    assert_eq!(run.state(), RunnerState::Stopped);

    drop(client);
    conn.await.unwrap().unwrap();
    tick_task.await.unwrap();
}
