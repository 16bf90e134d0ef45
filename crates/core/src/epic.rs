// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic entity. Consulted only for grouping/display — the core never
//! mutates epics, it just flattens `epic_short_id` into snapshots.

use crate::task::EpicId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub name: String,
}
