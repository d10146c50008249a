// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use fk_core::SyncItem;

use crate::cli::OutputFormat;
use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;

use super::Context;

/// Lists queued writes in send order. Does not touch the network.
pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let engine = ctx.open_reader(ConnectivityMonitor::new(false));
    let items = engine.pending();

    match output {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No pending writes.");
            }
            for item in &items {
                println!("{}", format_item(item));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
    }
    Ok(())
}

pub(crate) fn format_item(item: &SyncItem) -> String {
    format!(
        "{}  {}  {} {}  {}",
        item.id,
        item.timestamp.format("%Y-%m-%d %H:%M:%S"),
        item.operation,
        item.table,
        item.payload
    )
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
