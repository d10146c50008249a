// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change feed events.
//!
//! The remote store pushes one [`ChangeEvent`] per row change. Each entity
//! collection is its own topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Topic carrying prayer submissions.
pub const PRAYER_TOPIC: &str = "prayer_requests";

/// Collections the application subscribes to by default.
pub const DEFAULT_TOPICS: &[&str] = &[
    "members",
    "transactions",
    "attendance",
    "events",
    PRAYER_TOPIC,
    "announcements",
];

/// Returns [`DEFAULT_TOPICS`] as owned strings.
pub fn default_topics() -> Vec<String> {
    DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect()
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change in one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection (topic) the change happened in.
    pub table: String,
    /// What happened to the row.
    pub kind: ChangeKind,
    /// The row after the change, absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_row: Option<Value>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind, new_row: Option<Value>) -> Self {
        ChangeEvent {
            table: table.into(),
            kind,
            new_row,
        }
    }

    /// Returns true if this event belongs to one of `topics`.
    pub fn matches(&self, topics: &[String]) -> bool {
        topics.iter().any(|t| *t == self.table)
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
