// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver for the `cursor-agent` CLI.

use crate::driver::{get_f64, get_str, last_json_object, AgentDriver, ParsedOutput};
use fuel_core::Task;

pub struct CursorDriver {
    command: String,
}

impl CursorDriver {
    pub fn new() -> Self {
        Self {
            command: "cursor-agent".to_string(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for CursorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for CursorDriver {
    fn name(&self) -> &str {
        "cursor"
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn build_argv(&self, prompt: &str, _task: &Task) -> Vec<String> {
        vec![
            "--print".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--force".to_string(),
        ]
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> ParsedOutput {
        let Some(value) = last_json_object(stdout) else {
            return ParsedOutput::default();
        };
        ParsedOutput {
            session_id: get_str(&value, "session_id").map(str::to_string),
            model: get_str(&value, "model").map(str::to_string),
            cost_usd: get_f64(&value, "cost_usd"),
            error_type: None,
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
