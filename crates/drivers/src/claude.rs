// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver for the `claude` CLI.

use crate::driver::{get_f64, get_str, last_json_object, AgentDriver, ParsedOutput};
use fuel_core::Task;

/// Driver for Anthropic's `claude` CLI, invoked non-interactively with
/// `--output-format json` so the final line is a single parseable summary.
pub struct ClaudeDriver {
    command: String,
}

impl ClaudeDriver {
    pub fn new() -> Self {
        Self {
            command: "claude".to_string(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ClaudeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for ClaudeDriver {
    fn name(&self) -> &str {
        "claude"
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn build_argv(&self, prompt: &str, _task: &Task) -> Vec<String> {
        vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--dangerously-skip-permissions".to_string(),
        ]
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> ParsedOutput {
        let Some(value) = last_json_object(stdout) else {
            return ParsedOutput::default();
        };
        ParsedOutput {
            session_id: get_str(&value, "session_id").map(str::to_string),
            model: get_str(&value, "model").map(str::to_string),
            cost_usd: get_f64(&value, "total_cost_usd"),
            error_type: None,
        }
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
