// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::net::TcpListener;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `flock` pointed at `state` and at `remote_url`.
pub fn flock(state: &TempDir, remote_url: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("flock");
    cmd.env("FLOCK_STATE_DIR", state.path())
        .env("FLOCK_REMOTE_URL", remote_url)
        .env_remove("RUST_LOG");
    cmd
}

/// A ws:// URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{}", port)
}

/// Enqueues a write and returns its id.
pub fn enqueue(state: &TempDir, url: &str, table: &str, op: &str, payload: &str) -> String {
    let output = flock(state, url)
        .args(["enqueue", table, op, payload])
        .output()
        .unwrap();
    assert!(output.status.success(), "enqueue failed: {:?}", output);

    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .find(|s| s.starts_with("sync-"))
        .unwrap()
        .to_string()
}
