// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod config;
pub mod dead_letters;
pub mod drain;
pub mod enqueue;
pub mod pending;
pub mod status;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::GlobalArgs;
use crate::config::{resolve_state_dir, Config};
use crate::connectivity::ConnectivityMonitor;
use crate::engine::SyncEngine;
use crate::error::Result;
use crate::probe::{probe_addr, probe_once};
use crate::reconciler::DrainReport;
use crate::relay::RefreshFn;
use crate::remote::WebSocketRemote;
use crate::store::FileStore;

/// Resolved state directory and configuration for one invocation.
pub struct Context {
    pub state_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let state_dir = resolve_state_dir(global.state_dir.clone());
        let config = Config::load(&state_dir)?;
        Ok(Context { state_dir, config })
    }

    /// Samples connectivity once.
    pub async fn probe(&self) -> Result<ConnectivityMonitor> {
        let addr = probe_addr(&self.config.remote.url)?;
        let timeout = Duration::from_millis(self.config.remote.probe_timeout_ms);
        let online = probe_once(&addr, timeout).await;
        tracing::debug!("{} is {}", addr, if online { "reachable" } else { "unreachable" });
        Ok(ConnectivityMonitor::new(online))
    }

    /// Opens the engine over the state directory's store.
    ///
    /// Holds the store lock until the engine is dropped.
    pub fn open_engine(&self, monitor: ConnectivityMonitor, refresh: RefreshFn) -> Result<SyncEngine> {
        let kv = Arc::new(FileStore::open(&self.state_dir)?);
        let remote = Arc::new(WebSocketRemote::new(&self.config.remote));
        Ok(SyncEngine::new(&self.config.sync, kv, remote, monitor, refresh))
    }

    /// Opens the engine for inspection without taking the store lock, so it
    /// works while `flock watch` owns the store. Anything that persists fails.
    pub fn open_reader(&self, monitor: ConnectivityMonitor) -> SyncEngine {
        let kv = Arc::new(FileStore::open_read_only(&self.state_dir));
        let remote = Arc::new(WebSocketRemote::new(&self.config.remote));
        SyncEngine::new(&self.config.sync, kv, remote, monitor, no_refresh())
    }
}

/// Refresh callback for one-shot commands, which have nothing to refresh.
pub fn no_refresh() -> RefreshFn {
    Arc::new(|| {})
}

/// One-line summary of a drain.
pub fn drain_summary(report: &DrainReport) -> String {
    let mut line = format!("Synced {}", report.synced);
    if report.failed > 0 {
        line.push_str(&format!(", {} failed", report.failed));
    }
    if report.dead_lettered > 0 {
        line.push_str(&format!(", {} dead-lettered", report.dead_lettered));
    }
    line.push_str(&format!(", {} pending", report.remaining));
    line
}

/// Pluralizes `writes` for `n`.
pub fn writes(n: usize) -> &'static str {
    if n == 1 {
        "write"
    } else {
        "writes"
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
