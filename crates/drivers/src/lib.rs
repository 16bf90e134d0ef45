// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fuel-drivers: the `AgentDriver` registry that turns an agent name into
//! a command and interprets its subprocess output.

mod amp;
mod claude;
mod codex;
mod cursor;
mod driver;
mod opencode;
mod registry;

pub use amp::AmpDriver;
pub use claude::ClaudeDriver;
pub use codex::CodexDriver;
pub use cursor::CursorDriver;
pub use driver::{AgentDriver, ParsedOutput};
pub use opencode::OpenCodeDriver;
pub use registry::{AgentDriverRegistry, CANONICAL_AGENTS};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDriver;
