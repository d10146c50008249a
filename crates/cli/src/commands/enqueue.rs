// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use fk_core::Operation;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{drain_summary, no_refresh, writes, Context};

/// Queues one write, then drains right away if the remote is reachable.
pub async fn run(ctx: &Context, table: &str, operation: Operation, payload: &str) -> Result<()> {
    let payload = parse_payload(payload)?;

    let monitor = ctx.probe().await?;
    let engine = ctx.open_engine(monitor, no_refresh())?;

    let id = engine.enqueue(table, operation, payload)?;
    println!("Queued {}", id);

    if engine.is_offline() {
        let pending = engine.size();
        println!("Offline: {} {} pending", pending, writes(pending));
        return Ok(());
    }

    let report = engine.drain().await;
    println!("{}", drain_summary(&report));
    Ok(())
}

/// Parses the payload argument. Rows are JSON objects.
pub(crate) fn parse_payload(payload: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Err(Error::Core(fk_core::Error::PayloadNotObject));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
