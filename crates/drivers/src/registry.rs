// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AgentDriverRegistry`: resolves an agent name (and optional command
//! override) to a concrete [`AgentDriver`].

use crate::amp::AmpDriver;
use crate::claude::ClaudeDriver;
use crate::codex::CodexDriver;
use crate::cursor::CursorDriver;
use crate::driver::AgentDriver;
use crate::opencode::OpenCodeDriver;
use fuel_core::DriverResolutionError;
use std::sync::Arc;

/// The canonical agent names a substring match is allowed to resolve
/// against.
pub const CANONICAL_AGENTS: &[&str] = &["claude", "cursor", "opencode", "amp", "codex"];

/// Holds one driver per registered agent and resolves lookups by name,
/// then by command binary, then by case-insensitive substring against the
/// canonical set.
pub struct AgentDriverRegistry {
    drivers: Vec<Arc<dyn AgentDriver>>,
}

impl AgentDriverRegistry {
    /// A registry pre-populated with the five built-in drivers.
    pub fn with_builtin_drivers() -> Self {
        Self {
            drivers: vec![
                Arc::new(ClaudeDriver::new()),
                Arc::new(CursorDriver::new()),
                Arc::new(OpenCodeDriver::new()),
                Arc::new(AmpDriver::new()),
                Arc::new(CodexDriver::new()),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { drivers: Vec::new() }
    }

    pub fn register(&mut self, driver: Arc<dyn AgentDriver>) {
        self.drivers.push(driver);
    }

    /// Resolve `agent_name` (optionally disambiguated by `command`) to a
    /// driver. Resolution policy, in order:
    /// 1. Exact match on `name()`.
    /// 2. Match on `command()` if `command` was provided.
    /// 3. Case-insensitive substring match of `agent_name` against
    ///    [`CANONICAL_AGENTS`], then exact name match against that agent.
    ///
    /// Failing all three is a fatal dispatch error (`driver_error`).
    pub fn driver_for(
        &self,
        agent_name: &str,
        command: Option<&str>,
    ) -> Result<Arc<dyn AgentDriver>, DriverResolutionError> {
        if let Some(driver) = self.drivers.iter().find(|d| d.name() == agent_name) {
            return Ok(driver.clone());
        }

        if let Some(command) = command {
            if let Some(driver) = self.drivers.iter().find(|d| d.command() == command) {
                return Ok(driver.clone());
            }
        }

        let lower = agent_name.to_lowercase();
        if let Some(canonical) = CANONICAL_AGENTS.iter().find(|c| lower.contains(*c)) {
            if let Some(driver) = self.drivers.iter().find(|d| d.name() == *canonical) {
                return Ok(driver.clone());
            }
        }

        Err(DriverResolutionError::NotFound(agent_name.to_string()))
    }
}

impl Default for AgentDriverRegistry {
    fn default() -> Self {
        Self::with_builtin_drivers()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
