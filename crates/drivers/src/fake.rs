// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable driver for deterministic tests.

use crate::driver::{AgentDriver, ParsedOutput};
use fuel_core::Task;
use parking_lot::Mutex;
use std::sync::Arc;

/// A driver whose `parse_output` result is fixed at construction time, and
/// whose `build_argv` calls are recorded for assertions.
pub struct FakeDriver {
    name: String,
    command: String,
    parsed_output: ParsedOutput,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: "fake-agent".to_string(),
            parsed_output: ParsedOutput::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_parsed_output(mut self, parsed_output: ParsedOutput) -> Self {
        self.parsed_output = parsed_output;
        self
    }

    /// `(prompt, task_id)` pairs passed to `build_argv`, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

impl AgentDriver for FakeDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> &str {
        &self.command
    }

    fn build_argv(&self, prompt: &str, task: &Task) -> Vec<String> {
        self.calls
            .lock()
            .push((prompt.to_string(), task.id.as_str().to_string()));
        vec![prompt.to_string()]
    }

    fn parse_output(&self, _stdout: &str, _stderr: &str) -> ParsedOutput {
        self.parsed_output.clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
