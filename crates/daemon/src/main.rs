// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fueld` — the consume host as a standalone binary.
//!
//! Normally the `fuel` CLI's `consume` subcommand drives
//! `fuel_daemon::host::run` in-process; `fueld` exists for operators who
//! want the runner as its own supervised process (systemd, a container
//! entrypoint) without a CLI wrapper.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::time::Duration;

use fuel_daemon::host::{self, HostConfig};
use fuel_daemon::protocol_wire::PROTOCOL_VERSION;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    match std::env::args().nth(1).as_deref() {
        Some("--version" | "-v") => {
            println!("fueld {PROTOCOL_VERSION}");
            return;
        }
        Some("--help" | "-h") => {
            print_help();
            return;
        }
        Some(other) if other.starts_with('-') => {
            // flags are parsed below; only bail here for an unrecognized
            // bare positional, which fueld never takes.
            let _ = other;
        }
        Some(_) => {
            eprintln!("error: fueld takes no positional arguments");
            std::process::exit(2);
        }
        None => {}
    }

    let config = match parse_flags() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("error: {msg}");
            std::process::exit(2);
        }
    };

    setup_logging();

    match host::run(config).await {
        Ok(_snapshot) => {}
        Err(fuel_daemon::HostError::Lifecycle(fuel_daemon::LifecycleError::AlreadyRunning { pid })) => {
            eprintln!("fueld is already running (pid {pid})");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("fueld failed: {err}");
            std::process::exit(1);
        }
    }
}

fn parse_flags() -> Result<HostConfig, String> {
    let mut config = HostConfig {
        project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        ..HostConfig::default()
    };

    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--interval=") {
            config.interval = Duration::from_secs(
                value.parse().map_err(|_| format!("invalid --interval value: {value}"))?,
            );
        } else if let Some(value) = arg.strip_prefix("--max-concurrent-per-agent=") {
            config.max_concurrent_per_agent = value
                .parse()
                .map_err(|_| format!("invalid --max-concurrent-per-agent value: {value}"))?;
        } else if arg == "--once" {
            config.once = true;
        } else if arg == "--json" {
            config.json = true;
        } else {
            return Err(format!("unknown flag: {arg}"));
        }
    }
    Ok(config)
}

fn print_help() {
    println!("fueld {PROTOCOL_VERSION}");
    println!();
    println!("Background process that owns the consume loop.");
    println!();
    println!("USAGE:");
    println!("    fueld [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --interval=<seconds>               Tick cadence (default: 2)");
    println!("    --max-concurrent-per-agent=<n>      Per-agent concurrency cap (default: 1)");
    println!("    --once                              Run a single tick then exit");
    println!("    --json                              Emit snapshots as newline-delimited JSON on stdout");
    println!("    -h, --help                          Print help information");
    println!("    -v, --version                       Print version information");
}

fn setup_logging() {
    let filter = EnvFilter::try_new(fuel_daemon::env::log_level()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
