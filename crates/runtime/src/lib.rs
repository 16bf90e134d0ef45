// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Fuel Runner execution engine: `ProcessManager`, `HealthTracker`,
//! `ReviewService`, `SnapshotBuilder`, and `ConsumeLoop`.

mod consume;
mod error;
mod health;
mod process;
mod review;
mod snapshot;

pub use consume::{ConsumeConfig, ConsumeLoop, StartupReport, TaskPromptBuilder};
pub use error::RuntimeError;
pub use health::{
    backoff_for, backoff_for_with_rng, HealthTracker, BACKOFF_EXPONENT_CAP, FATAL_BASE_SECS, JITTER_FRACTION,
    RECOVERABLE_BASE_SECS,
};
pub use process::{
    ProcessManager, SpawnError, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_RUNTIME, DEFAULT_RING_BUFFER_CAPACITY,
    DEFAULT_SHUTDOWN_GRACE,
};
pub use review::{parse_reviewer_verdict, truncate_diff, DiffProvider, ParsedVerdict, ReviewOutcome, ReviewPromptBuilder, ReviewService, DIFF_TRUNCATE_LIMIT};
pub use snapshot::{BrowserDaemonStatus, ConsumeSnapshot, EffectiveConfig, RunnerState, SnapshotBuilder, TaskSummary};
