// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::feed::WebSocketFeed;
use crate::probe::ConnectivityProbe;
use crate::relay::{ChangeRelay, NoticeBoard, RefreshFn, RelaySettings, Role};

use super::Context;

/// How often a failed relay sign-in is retried while online.
const RELAY_RETRY: Duration = Duration::from_secs(15);

/// Runs the sync worker and the change relay until interrupted.
///
/// The relay signs in whenever the remote is reachable and no subscription is
/// alive.
pub async fn run(ctx: &Context, role: Role) -> Result<()> {
    let monitor = ConnectivityMonitor::new(false);
    let probe = ConnectivityProbe::new(&ctx.config.remote, monitor.clone())?;
    let mut transitions = monitor.subscribe();
    let probe_task = probe.spawn();
    let offline_log = monitor.on_offline(|| async {
        println!("[{}] remote unreachable, writes will queue", Local::now().format("%H:%M:%S"));
    });
    let online_log = monitor.on_online(|| async {
        println!("[{}] remote reachable, sending queued writes", Local::now().format("%H:%M:%S"));
    });

    let refresh: RefreshFn = Arc::new(|| {
        println!("[{}] remote changed, refreshing", Local::now().format("%H:%M:%S"));
    });

    let mut engine = ctx.open_engine(monitor.clone(), Arc::clone(&refresh))?;
    engine.start();
    println!(
        "Watching {} as {} ({} pending)",
        ctx.config.remote.url,
        role,
        engine.size()
    );

    let notices = NoticeBoard::new();
    let mut posted = notices.subscribe();
    let notice_printer = tokio::spawn(async move {
        while let Ok(notice) = posted.recv().await {
            let at = notice.posted_at.with_timezone(&Local);
            println!("[{}] {}", at.format("%H:%M:%S"), notice.message);
        }
    });

    let feed = Arc::new(WebSocketFeed::new(&ctx.config.remote));
    let mut relay = ChangeRelay::new(
        feed,
        RelaySettings::from(&ctx.config.feed),
        refresh,
        notices,
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if monitor.is_online() && !relay.is_active() {
            if let Err(e) = relay.sign_in(role).await {
                tracing::warn!("change relay unavailable: {}", e);
            }
        }

        tokio::select! {
            _ = &mut ctrl_c => break,
            transition = transitions.next() => {
                if transition.is_none() {
                    break;
                }
            }
            _ = tokio::time::sleep(RELAY_RETRY) => {}
        }
    }

    relay.sign_out();
    engine.shutdown().await;
    probe.cancel();
    let _ = probe_task.await;
    notice_printer.abort();
    offline_log.abort();
    online_log.abort();

    let pending = engine.size();
    if pending > 0 {
        println!("Stopped with {} {} pending", pending, super::writes(pending));
    }
    Ok(())
}
