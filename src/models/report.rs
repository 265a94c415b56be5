// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Generated report model.

use serde::{Deserialize, Serialize};

/// Report produced by the generation function. Never modified after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Generated identifier (also used as document ID)
    pub id: String,
    /// Owner
    pub user_email: String,
    /// Normalized report body, always a JSON object
    pub report: serde_json::Value,
    /// Requested look-back window in days
    pub days: u32,
    pub created_at: String,
}
