// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver for the `amp` CLI.

use crate::driver::{get_f64, get_str, last_json_object, AgentDriver, ParsedOutput};
use fuel_core::Task;

pub struct AmpDriver {
    command: String,
}

impl AmpDriver {
    pub fn new() -> Self {
        Self {
            command: "amp".to_string(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for AmpDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDriver for AmpDriver {
    fn name(&self) -> &str {
        "amp"
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn build_argv(&self, prompt: &str, _task: &Task) -> Vec<String> {
        vec![
            "-x".to_string(),
            prompt.to_string(),
            "--stream-json".to_string(),
        ]
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> ParsedOutput {
        let Some(value) = last_json_object(stdout) else {
            return ParsedOutput::default();
        };
        ParsedOutput {
            session_id: get_str(&value, "threadID").map(str::to_string),
            model: get_str(&value, "model").map(str::to_string),
            cost_usd: get_f64(&value, "costUsd"),
            error_type: None,
        }
    }
}

#[cfg(test)]
#[path = "amp_tests.rs"]
mod tests;
