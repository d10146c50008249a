// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::queue::DeadLetter;

use super::{drain_summary, no_refresh, writes, Context};

/// Lists dead letters, or requeues or discards them.
pub async fn run(ctx: &Context, requeue: bool, discard: bool, output: OutputFormat) -> Result<()> {
    if requeue {
        let monitor = ctx.probe().await?;
        let engine = ctx.open_engine(monitor, no_refresh())?;
        let requeued = engine.requeue_dead_letters()?;
        println!("Requeued {} {}", requeued.moved, writes(requeued.moved));
        if requeued.held > 0 {
            println!(
                "warning: kept {} dead {}: newer pending writes change the same records",
                requeued.held,
                if requeued.held == 1 { "letter" } else { "letters" }
            );
        }
        if requeued.moved > 0 && !engine.is_offline() {
            let report = engine.drain().await;
            println!("{}", drain_summary(&report));
        }
        return Ok(());
    }

    let monitor = crate::connectivity::ConnectivityMonitor::new(false);
    if discard {
        let engine = ctx.open_engine(monitor, no_refresh())?;
        let count = engine.discard_dead_letters()?;
        println!("Discarded {} {}", count, writes(count));
        return Ok(());
    }

    let dead = ctx.open_reader(monitor).dead_letters();
    match output {
        OutputFormat::Text => {
            if dead.is_empty() {
                println!("No dead letters.");
            }
            for letter in &dead {
                println!("{}", format_dead_letter(letter));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dead)?),
    }
    Ok(())
}

pub(crate) fn format_dead_letter(letter: &DeadLetter) -> String {
    format!(
        "{}  {} {}  rejected {}x: {}",
        letter.item.id,
        letter.item.operation,
        letter.item.table,
        letter.rejections,
        letter.reason.lines().next().unwrap_or_default()
    )
}

#[cfg(test)]
#[path = "dead_letters_tests.rs"]
mod tests;
