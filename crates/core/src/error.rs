// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for fk-core operations.

use thiserror::Error;

use crate::item::RECORD_ID_KEY;

/// All possible errors that can occur in fk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("payload must be a JSON object")]
    PayloadNotObject,

    #[error("payload is missing the record id\n  hint: update and delete payloads need an '{}' field", RECORD_ID_KEY)]
    MissingRecordId,

    #[error("invalid operation: '{0}'\n  hint: valid operations are: insert, update, delete")]
    InvalidOperation(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for fk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
