// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

use crate::feed::FeedError;
use crate::remote::RemoteError;

/// All possible errors that can occur in the flock library.
///
/// Only interactive calls surface these. Background drains and queue loads
/// log their failures and carry on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("store at {} is in use by another process\n  hint: stop the other flock process first", .0.display())]
    StoreLocked(PathBuf),

    #[error(transparent)]
    Core(#[from] fk_core::Error),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("change feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("invalid role: '{0}'\n  hint: valid roles are: admin, leader, member")]
    InvalidRole(String),
}

/// A specialized Result type for flock operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
