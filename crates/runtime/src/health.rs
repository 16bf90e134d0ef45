// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HealthTracker`: per-agent success/failure bookkeeping and dispatch
//! backoff.

use fuel_core::{AgentHealth, AgentHealthSummary, Clock, FailureType, DEFAULT_DEATH_THRESHOLD};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Base backoff for a recoverable failure (`timeout`, `non_zero_exit`).
pub const RECOVERABLE_BASE_SECS: u64 = 5;

/// Base backoff for a fatal-classification failure (`spawn_failed`,
/// `driver_error`, `killed_by_user`).
pub const FATAL_BASE_SECS: u64 = 30;

/// `min(n-1, cap)` caps the exponent so the ceiling before jitter is ~20 min.
pub const BACKOFF_EXPONENT_CAP: u32 = 6;

/// Jitter applied to the computed backoff, as a fraction of the base value.
pub const JITTER_FRACTION: f64 = 0.25;

/// Compute `backoff_for(n, type)` per, using `rng` for jitter
/// so callers can substitute a deterministic source in tests.
pub fn backoff_for_with_rng(
    consecutive_failures: u32,
    failure_type: FailureType,
    rng: &mut impl Rng,
) -> std::time::Duration {
    let base = if failure_type.is_recoverable() {
        RECOVERABLE_BASE_SECS
    } else {
        FATAL_BASE_SECS
    };
    let exponent = consecutive_failures.saturating_sub(1).min(BACKOFF_EXPONENT_CAP);
    let unjittered = (base as f64) * 2f64.powi(exponent as i32);
    let jitter = rng.random_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = (unjittered * (1.0 + jitter)).max(0.0);
    std::time::Duration::from_secs_f64(jittered)
}

/// Same as [`backoff_for_with_rng`] but draws jitter from the thread RNG.
pub fn backoff_for(consecutive_failures: u32, failure_type: FailureType) -> std::time::Duration {
    backoff_for_with_rng(consecutive_failures, failure_type, &mut rand::rng())
}

/// Tracks per-agent health and gates dispatch via exponential backoff.
///
/// Each agent's row lives behind its own [`Mutex`] so that two agents'
/// terminal transitions never contend with each other; updates commute
/// because each agent's counters are updated under a per-agent critical
/// section.
pub struct HealthTracker<C: Clock> {
    clock: C,
    death_threshold: u32,
    rows: Mutex<HashMap<String, Arc<Mutex<AgentHealth>>>>,
}

impl<C: Clock> HealthTracker<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            death_threshold: DEFAULT_DEATH_THRESHOLD,
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_death_threshold(clock: C, death_threshold: u32) -> Self {
        Self {
            clock,
            death_threshold,
            rows: Mutex::new(HashMap::new()),
        }
    }

    fn row(&self, agent: &str) -> Arc<Mutex<AgentHealth>> {
        let mut rows = self.rows.lock();
        rows.entry(agent.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(AgentHealth::new(agent))))
            .clone()
    }

    /// Sets `last_success_at`, resets `consecutive_failures` to 0, clears
    /// `backoff_until`, and increments `total_runs`/`total_successes`.
    /// Idempotent within the same terminal event in the sense that calling
    /// it twice for one reap is harmless (the counters move the same way
    /// regardless of caller retries).
    pub fn record_success(&self, agent: &str) {
        let row = self.row(agent);
        let mut health = row.lock();
        health.last_success_at_ms = Some(self.clock.now_ms());
        health.consecutive_failures = 0;
        health.backoff_until_ms = None;
        health.total_runs += 1;
        health.total_successes += 1;
    }

    /// Sets `last_failure_at`, increments `consecutive_failures` and
    /// `total_runs`, and recomputes `backoff_until`.
    pub fn record_failure(&self, agent: &str, failure_type: FailureType) {
        let row = self.row(agent);
        let mut health = row.lock();
        health.last_failure_at_ms = Some(self.clock.now_ms());
        health.consecutive_failures += 1;
        health.total_runs += 1;
        let backoff = backoff_for(health.consecutive_failures, failure_type);
        health.backoff_until_ms = Some(self.clock.now_ms() + backoff.as_millis() as u64);
    }

    /// `true` iff no backoff is set or it has already elapsed.
    pub fn is_available(&self, agent: &str) -> bool {
        let row = self.row(agent);
        let health = row.lock();
        match health.backoff_until_ms {
            None => true,
            Some(until) => until <= self.clock.now_ms(),
        }
    }

    /// `true` iff `consecutive_failures >= death_threshold`.
    pub fn is_dead(&self, agent: &str) -> bool {
        let row = self.row(agent);
        let health = row.lock();
        health.is_dead(self.death_threshold)
    }

    /// `max(0, ceil(backoff_until - now))`, in whole seconds.
    pub fn backoff_seconds(&self, agent: &str) -> u64 {
        let row = self.row(agent);
        let health = row.lock();
        match health.backoff_until_ms {
            None => 0,
            Some(until) => {
                let now = self.clock.now_ms();
                if until <= now {
                    0
                } else {
                    (until - now).div_ceil(1000)
                }
            }
        }
    }

    pub fn get_health_status(&self, agent: &str) -> Option<AgentHealthSummary> {
        let rows = self.rows.lock();
        let row = rows.get(agent)?.clone();
        drop(rows);
        Some(self.summarize(agent, &row.lock()))
    }

    pub fn get_all_health_status(&self) -> Vec<AgentHealthSummary> {
        let snapshot: Vec<(String, Arc<Mutex<AgentHealth>>)> = {
            let rows = self.rows.lock();
            rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        snapshot
            .into_iter()
            .map(|(agent, row)| self.summarize(&agent, &row.lock()))
            .collect()
    }

    /// Builds a summary from an already-held `&AgentHealth`. Must not call
    /// back into `is_available`/`backoff_seconds`/`is_dead` — those each
    /// re-lock this same agent's row and would deadlock against the guard
    /// the caller is already holding.
    fn summarize(&self, agent: &str, health: &AgentHealth) -> AgentHealthSummary {
        let now = self.clock.now_ms();
        let backoff_seconds_remaining = match health.backoff_until_ms {
            None => 0,
            Some(until) if until <= now => 0,
            Some(until) => (until - now).div_ceil(1000),
        };
        let in_backoff = backoff_seconds_remaining > 0;
        let is_dead = health.is_dead(self.death_threshold);
        let status = if is_dead {
            "dead"
        } else if in_backoff {
            "backoff"
        } else {
            "available"
        };
        AgentHealthSummary {
            agent: agent.to_string(),
            status: status.to_string(),
            backoff_seconds_remaining,
            in_backoff,
            is_dead,
            consecutive_failures: health.consecutive_failures,
            total_runs: health.total_runs,
            total_successes: health.total_successes,
        }
    }

    /// Resets an agent's row, used to recover a dead agent.
    pub fn clear_health(&self, agent: &str) {
        let row = self.row(agent);
        let mut health = row.lock();
        *health = AgentHealth::new(agent);
    }

    /// Seed the tracker from a persisted row, used at startup when
    /// reconciling with `TaskStore::read_all_health`.
    pub fn seed(&self, health: AgentHealth) {
        let mut rows = self.rows.lock();
        rows.insert(health.agent.clone(), Arc::new(Mutex::new(health)));
    }

    pub fn snapshot(&self, agent: &str) -> Option<AgentHealth> {
        let rows = self.rows.lock();
        rows.get(agent).map(|row| row.lock().clone())
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
