// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! flock - offline-tolerant write queue and sync engine.
//!
//! Writes made while the remote store is unreachable are queued durably and
//! replayed in order once connectivity returns. While a user is signed in,
//! the remote's change feed drives refreshes and transient notices.
//!
//! # Main Components
//!
//! - [`WriteQueue`](queue::WriteQueue) - durable FIFO of pending writes
//! - [`Reconciler`](reconciler::Reconciler) - drains the queue into a [`RemoteStore`]
//! - [`ConnectivityMonitor`] - online/offline state and transitions
//! - [`ChangeRelay`](relay::ChangeRelay) - change feed subscription per session
//! - [`SyncEngine`] - wires the above together and runs the drain worker
//!
//! ```rust,ignore
//! use flock::{ConnectivityMonitor, SyncEngine, SyncPolicy};
//! use flock::store::MemoryStore;
//!
//! let monitor = ConnectivityMonitor::new(false);
//! let mut engine = SyncEngine::new(&SyncPolicy::default(), kv, remote, monitor.clone(), refresh);
//! engine.start();
//! engine.enqueue("members", Operation::Insert, json!({"name": "Ada"}))?;
//! monitor.set_online(true); // queued write drains in the background
//! ```

mod cli;
mod commands;
mod env;

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod feed;
pub mod probe;
pub mod queue;
pub mod reconciler;
pub mod relay;
pub mod remote;
pub mod store;

#[cfg(test)]
mod test_helpers;

pub use cli::{Cli, Command, ConfigCommand, GlobalArgs, OutputFormat};
pub use config::{Config, FeedConfig, RemoteConfig, SyncPolicy};
pub use connectivity::{ConnectivityMonitor, Transition};
pub use engine::{SyncEngine, SyncStatus, WriteOutcome};
pub use error::{Error, Result};
pub use remote::{RemoteError, RemoteStore};

use commands::Context;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(global: &GlobalArgs, command: Command) -> Result<()> {
    let ctx = Context::load(global)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(&ctx, command))
}

async fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Enqueue {
            table,
            operation,
            payload,
        } => commands::enqueue::run(ctx, &table, operation, &payload).await,
        Command::Status { output } => commands::status::run(ctx, output).await,
        Command::Pending { output } => commands::pending::run(ctx, output),
        Command::Drain => commands::drain::run(ctx).await,
        Command::DeadLetters {
            requeue,
            discard,
            output,
        } => commands::dead_letters::run(ctx, requeue, discard, output).await,
        Command::Watch { role } => commands::watch::run(ctx, role).await,
        Command::Config { command } => commands::config::run(ctx, command),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
