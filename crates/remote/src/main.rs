// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fk-remote: WebSocket remote store for the flock sync engine.
//!
//! Keeps the authoritative tables in memory, acknowledges or rejects row
//! mutations, and pushes change events to subscribed clients.

mod server;
#[cfg(test)]
mod server_tests;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// fk-remote: Remote store for flock
#[derive(Parser, Debug)]
#[command(name = "fk-remote")]
#[command(about = "WebSocket remote store for the flock sync engine")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Reject every mutation on this table (repeatable)
    #[arg(long = "deny-table", value_name = "TABLE")]
    deny_tables: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting fk-remote server");
    info!("  Bind address: {}", args.bind);
    for table in &args.deny_tables {
        info!("  Denied table: {}", table);
    }

    let state = state::ServerState::new(args.deny_tables);
    server::run(args.bind, state).await?;

    Ok(())
}
