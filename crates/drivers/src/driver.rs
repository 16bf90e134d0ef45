// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AgentDriver`: name → command + args, and subprocess output → parsed
//! metadata.

use fuel_core::{FailureType, Task};

/// Metadata recovered from a finished agent subprocess's stdout/stderr.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub cost_usd: Option<f64>,
    pub error_type: Option<FailureType>,
}

/// Turns an agent name into a runnable command and interprets its output.
///
/// Implementations are pure and stateless: no process spawning happens
/// here, that's `fuel-runtime::ProcessManager`'s job. A driver only knows
/// how to build an argv for a given prompt/task and how to read back
/// whatever its particular CLI prints.
pub trait AgentDriver: Send + Sync {
    /// Canonical agent name, e.g. `"claude"`.
    fn name(&self) -> &str;

    /// The binary this driver invokes.
    fn command(&self) -> &str;

    /// Build the argument vector for one invocation.
    fn build_argv(&self, prompt: &str, task: &Task) -> Vec<String>;

    /// Parse metadata out of a finished subprocess's combined output.
    fn parse_output(&self, stdout: &str, stderr: &str) -> ParsedOutput;
}

/// Scan `stdout` line by line and return the last line that parses as a
/// JSON object, along with its parsed value. Most agent CLIs emit a final
/// structured summary line (`--output-format json`-style); scanning from
/// the end is robust against interleaved progress output on earlier lines.
pub fn last_json_object(stdout: &str) -> Option<serde_json::Value> {
    stdout
        .lines()
        .rev()
        .find_map(|line| {
            let trimmed = line.trim();
            if trimmed.starts_with('{') && trimmed.ends_with('}') {
                serde_json::from_str::<serde_json::Value>(trimmed).ok()
            } else {
                None
            }
        })
        .filter(|v| v.is_object())
}

/// Extract a string field by key.
pub fn get_str<'a>(obj: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

/// Extract an f64 field by key.
pub fn get_f64(obj: &serde_json::Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
