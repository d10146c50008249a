// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending mutations.
//!
//! A [`SyncItem`] is one write accepted locally and not yet confirmed by the
//! remote store. Items are immutable once built; the queue only ever appends
//! and removes them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Payload key carrying the remote record identifier for UPDATE and DELETE.
pub const RECORD_ID_KEY: &str = "id";

/// Disambiguates ids generated within the same clock tick.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier assigned to a [`SyncItem`] at enqueue time.
///
/// Used only to remove the item after it syncs; never sent to the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncItemId(String);

impl SyncItemId {
    /// Generates a fresh id for the given item contents.
    ///
    /// Format: `sync-{hash}` where hash is the first 16 hex chars of
    /// SHA256(table + operation + payload + timestamp + counter).
    pub fn generate(
        table: &str,
        operation: Operation,
        payload: &Value,
        created_at: &DateTime<Utc>,
    ) -> Self {
        let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let input = format!(
            "{}{}{}{}{}",
            table,
            operation,
            payload,
            created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            seq
        );
        let hash = Sha256::digest(input.as_bytes());
        SyncItemId(format!("sync-{}", hex::encode(&hash[..8])))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyncItemId {
    fn from(s: &str) -> Self {
        SyncItemId(s.to_string())
    }
}

/// Kind of mutation; selects the reconciliation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(Error::InvalidOperation(s.to_string())),
        }
    }
}

/// A single pending mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncItem {
    /// Unique id, assigned at enqueue time.
    pub id: SyncItemId,
    /// Target collection. Not validated.
    pub table: String,
    /// Mutation kind.
    pub operation: Operation,
    /// Opaque row data. UPDATE and DELETE carry the record id under
    /// [`RECORD_ID_KEY`].
    pub payload: Value,
    /// Creation time. Advisory only.
    pub timestamp: DateTime<Utc>,
}

impl SyncItem {
    /// Builds a new item with a fresh id and the current time.
    pub fn new(table: impl Into<String>, operation: Operation, payload: Value) -> Self {
        let table = table.into();
        let timestamp = Utc::now();
        let id = SyncItemId::generate(&table, operation, &payload, &timestamp);
        SyncItem {
            id,
            table,
            operation,
            payload,
            timestamp,
        }
    }
}

/// Splits an UPDATE payload into the record id and the remaining fields.
pub fn split_record_id(payload: &Value) -> Result<(Value, Map<String, Value>)> {
    let mut fields = payload.as_object().cloned().ok_or(Error::PayloadNotObject)?;
    match fields.remove(RECORD_ID_KEY) {
        Some(Value::Null) | None => Err(Error::MissingRecordId),
        Some(id) => Ok((id, fields)),
    }
}

/// Returns the record id of a DELETE payload, verbatim.
pub fn record_id(payload: &Value) -> Result<Value> {
    let fields = payload.as_object().ok_or(Error::PayloadNotObject)?;
    match fields.get(RECORD_ID_KEY) {
        Some(Value::Null) | None => Err(Error::MissingRecordId),
        Some(id) => Ok(id.clone()),
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
