// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent health bookkeeping.

use serde::{Deserialize, Serialize};

/// Default consecutive-failure count at which an agent is considered dead.
pub const DEFAULT_DEATH_THRESHOLD: u32 = 5;

/// One row per agent, owned by `fuel-runtime::HealthTracker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at_ms: Option<u64>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_until_ms: Option<u64>,
    #[serde(default)]
    pub total_runs: u64,
    #[serde(default)]
    pub total_successes: u64,
}

impl AgentHealth {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            last_success_at_ms: None,
            last_failure_at_ms: None,
            consecutive_failures: 0,
            backoff_until_ms: None,
            total_runs: 0,
            total_successes: 0,
        }
    }

    pub fn total_failures(&self) -> u64 {
        self.total_runs.saturating_sub(self.total_successes)
    }

    pub fn is_dead(&self, death_threshold: u32) -> bool {
        self.consecutive_failures >= death_threshold
    }
}

/// Derived view of [`AgentHealth`] at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealthSummary {
    pub agent: String,
    pub status: String,
    pub backoff_seconds_remaining: u64,
    pub in_backoff: bool,
    pub is_dead: bool,
    pub consecutive_failures: u32,
    pub total_runs: u64,
    pub total_successes: u64,
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
