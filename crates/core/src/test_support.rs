// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for other crates' tests. Only compiled with
//! `feature = "test-support"` or under `#[cfg(test)]`.

use crate::instance::InstanceId;

/// A fixed instance id for deterministic test assertions.
pub fn fixed_instance(label: &str) -> InstanceId {
    InstanceId::from(format!("instance-{label}"))
}
