// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::Result;

use super::{drain_summary, no_refresh, writes, Context};

/// Sends queued writes now.
pub async fn run(ctx: &Context) -> Result<()> {
    let monitor = ctx.probe().await?;
    let engine = ctx.open_engine(monitor, no_refresh())?;

    if engine.is_offline() {
        let pending = engine.size();
        println!(
            "Offline: {} {} pending, {} unreachable",
            pending,
            writes(pending),
            ctx.config.remote.url
        );
        return Ok(());
    }

    let report = engine.drain().await;
    println!("{}", drain_summary(&report));
    if report.dead_lettered > 0 {
        println!("hint: inspect rejected writes with `flock dead-letters`");
    }
    Ok(())
}
