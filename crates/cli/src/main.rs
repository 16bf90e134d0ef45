// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fuel` — CLI front door for the consume host.
//!
//! Every other surface the legacy CLI exposed (runbooks, pipelines, queues,
//! crons, per-job inspection) lives outside this binary; `consume` is the
//! only subcommand that drives the in-process core directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fuel_daemon::host::{self, HostConfig};
use fuel_daemon::protocol_wire::PROTOCOL_VERSION;
use fuel_daemon::{Request, Response};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fuel", version = PROTOCOL_VERSION, about = "Task-orchestration runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consume loop: poll the task store, dispatch agents, review
    /// completed work, and serve status over the local IPC socket.
    Consume {
        /// Directory to run in (defaults to the current directory).
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,

        /// Tick cadence in seconds.
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Per-agent concurrency cap.
        #[arg(long = "max-concurrent-per-agent", default_value_t = 1)]
        max_concurrent_per_agent: u32,

        /// Run a single tick then exit.
        #[arg(long)]
        once: bool,

        /// Emit snapshots as newline-delimited JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print the running daemon's state, health, and task counts.
    Status {
        /// Directory the target daemon is running in (defaults to cwd).
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,
    },

    /// Pause dispatch: `Running -> Paused`.
    Pause {
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,
    },

    /// Resume dispatch: `Paused -> Running`.
    Resume {
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,
    },

    /// Print the buffered stdout/stderr for one task's live process.
    Logs {
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,

        /// Id of the task whose process output to print.
        task_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging();

    match cli.command {
        Commands::Consume { directory, interval, max_concurrent_per_agent, once, json } => {
            let project_root = directory
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            let config = HostConfig {
                project_root,
                interval: Duration::from_secs(interval),
                max_concurrent_per_agent,
                once,
                json,
            };
            run_consume(config).await;
        }
        Commands::Status { directory } => run_peer(directory, Request::Status).await,
        Commands::Pause { directory } => run_peer(directory, Request::Pause).await,
        Commands::Resume { directory } => run_peer(directory, Request::Resume).await,
        Commands::Logs { directory, task_id } => {
            run_peer(directory, Request::Logs { task_id }).await
        }
    }
}

/// Resolve the target project directory, send one IPC request to its
/// daemon, print the reply, and exit with the peer-command convention: 0
/// on success, 1 if the daemon is unreachable, 2 if it rejects the request.
async fn run_peer(directory: Option<PathBuf>, request: Request) {
    let project_root = directory
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    match client::send(&project_root, request).await {
        Ok(response) => print_response(&response),
        Err(err) => {
            eprintln!("fuel: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

fn print_response(response: &Response) {
    match response {
        Response::Status { state, unhealthy, done_count, blocked_count } => {
            println!("state: {state}");
            println!("unhealthy: {unhealthy}");
            println!("done: {done_count}");
            println!("blocked: {blocked_count}");
        }
        Response::Logs { stdout, stderr } => {
            print!("{stdout}");
            eprint!("{stderr}");
        }
        Response::Ok => {}
        other => println!("{other:?}"),
    }
}

async fn run_consume(config: HostConfig) {
    match host::run(config).await {
        Ok(_snapshot) => {}
        Err(fuel_daemon::HostError::Lifecycle(fuel_daemon::LifecycleError::AlreadyRunning { pid })) => {
            eprintln!("consume runner already running (pid {pid})");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("fuel consume failed: {err}");
            std::process::exit(1);
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_new(fuel_daemon::env::log_level()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
