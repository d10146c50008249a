// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.

use std::path::PathBuf;

/// Environment variable names.
pub mod vars {
    pub const FLOCK_STATE_DIR: &str = "FLOCK_STATE_DIR";
    pub const FLOCK_REMOTE_URL: &str = "FLOCK_REMOTE_URL";
    pub const XDG_STATE_HOME: &str = "XDG_STATE_HOME";
}

/// Returns the value of `FLOCK_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(vars::FLOCK_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(vars::XDG_STATE_HOME).ok().map(PathBuf::from)
}

/// Returns the value of `FLOCK_REMOTE_URL` if set and non-empty.
pub fn remote_url() -> Option<String> {
    std::env::var(vars::FLOCK_REMOTE_URL)
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
