// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::cli::OutputFormat;
use crate::engine::SyncStatus;
use crate::error::Result;

use super::Context;

/// Prints connectivity and queue state.
pub async fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let monitor = ctx.probe().await?;
    let engine = ctx.open_reader(monitor);
    let status = engine.status();

    match output {
        OutputFormat::Text => print!("{}", format_status(ctx, &status)),
        OutputFormat::Json => {
            let value = json!({
                "remote": ctx.config.remote.url,
                "online": status.online,
                "pending": status.pending,
                "dead_letters": status.dead_letters,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

pub(crate) fn format_status(ctx: &Context, status: &SyncStatus) -> String {
    let mut out = format!(
        "Remote:       {} ({})\n",
        ctx.config.remote.url,
        if status.online { "online" } else { "offline" }
    );
    out.push_str(&format!("Pending:      {}\n", status.pending));
    if status.dead_letters > 0 {
        out.push_str(&format!(
            "Dead letters: {} (see `flock dead-letters`)\n",
            status.dead_letters
        ));
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
