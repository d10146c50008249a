// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue drain.
//!
//! A drain pass walks a snapshot of the queue in order and sends each item to
//! the remote. Accepted items are removed; failed items stay in place for the
//! next pass. A failure never stops the pass: later items are still tried.
//!
//! Only one pass runs at a time. A drain requested while a pass is running
//! makes the running caller do one more pass once it finishes, so writes
//! enqueued mid-pass are not stranded until the next trigger.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fk_core::SyncItem;
use futures_util::FutureExt;

use crate::config::SyncPolicy;
use crate::connectivity::ConnectivityMonitor;
use crate::queue::WriteQueue;
use crate::remote::{apply, RemoteError, RemoteStore};

/// How a drain call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// At least one pass walked the queue.
    Completed,
    /// Offline or nothing queued.
    Skipped,
    /// Another drain was already running and will pick up this request.
    Coalesced,
}

/// Summary of a drain call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Items accepted by the remote and removed.
    pub synced: usize,
    /// Items that failed and were kept or dead-lettered.
    pub failed: usize,
    /// Items moved to the dead-letter list.
    pub dead_lettered: usize,
    /// Queue length when the call returned.
    pub remaining: usize,
}

impl DrainReport {
    fn new(outcome: DrainOutcome, remaining: usize) -> Self {
        DrainReport {
            outcome,
            synced: 0,
            failed: 0,
            dead_lettered: 0,
            remaining,
        }
    }

    /// Folds a later pass into this report.
    fn absorb(&mut self, pass: DrainReport) {
        self.outcome = match (self.outcome, pass.outcome) {
            (DrainOutcome::Completed, _) | (_, DrainOutcome::Completed) => DrainOutcome::Completed,
            (DrainOutcome::Skipped, _) | (_, DrainOutcome::Skipped) => DrainOutcome::Skipped,
            _ => DrainOutcome::Coalesced,
        };
        self.synced += pass.synced;
        self.failed += pass.failed;
        self.dead_lettered += pass.dead_lettered;
        self.remaining = pass.remaining;
    }
}

/// Clears the running flag when a pass ends, even by unwinding.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains a [`WriteQueue`] into a [`RemoteStore`].
pub struct Reconciler {
    queue: WriteQueue,
    remote: Arc<dyn RemoteStore>,
    monitor: ConnectivityMonitor,
    /// Permanent rejections before an item is dead-lettered; 0 never.
    max_rejections: u32,
    running: AtomicBool,
    /// A drain was requested since the running pass started.
    requested: AtomicBool,
}

impl Reconciler {
    pub fn new(queue: WriteQueue, remote: Arc<dyn RemoteStore>, policy: &SyncPolicy) -> Self {
        let monitor = queue.monitor().clone();
        Reconciler {
            queue,
            remote,
            monitor,
            max_rejections: policy.max_rejections,
            running: AtomicBool::new(false),
            requested: AtomicBool::new(false),
        }
    }

    /// Returns true while a pass is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Attempts to sync every queued item.
    ///
    /// Returns [`DrainOutcome::Coalesced`] without doing anything if another
    /// drain is running; that drain runs an extra pass for this request.
    pub async fn drain(&self) -> DrainReport {
        self.requested.store(true, Ordering::Release);
        let mut report = DrainReport::new(DrainOutcome::Coalesced, self.queue.size());

        loop {
            let Some(guard) = self.try_begin() else {
                tracing::debug!("drain already running, request coalesced");
                return report;
            };

            if self.requested.swap(false, Ordering::AcqRel) {
                report.absorb(self.pass().await);
                drop(guard);
                continue;
            }

            drop(guard);
            // A request that landed between the swap and the release would
            // otherwise be lost
            if !self.requested.load(Ordering::Acquire) {
                return report;
            }
        }
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    async fn pass(&self) -> DrainReport {
        if !self.monitor.is_online() {
            tracing::debug!("offline, skipping drain");
            return DrainReport::new(DrainOutcome::Skipped, self.queue.size());
        }

        let snapshot = self.queue.snapshot();
        if snapshot.is_empty() {
            return DrainReport::new(DrainOutcome::Skipped, 0);
        }

        tracing::info!("draining {} queued writes", snapshot.len());
        let mut report = DrainReport::new(DrainOutcome::Completed, 0);

        for item in &snapshot {
            if !self.monitor.is_online() {
                tracing::info!("went offline mid-drain, remaining writes wait for next pass");
                break;
            }

            let result = AssertUnwindSafe(apply(self.remote.as_ref(), item))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(())) => {
                    report.synced += 1;
                    tracing::debug!("synced {} {} {}", item.id, item.operation, item.table);
                    if let Err(e) = self.queue.remove(&item.id) {
                        tracing::warn!("synced {} but failed to persist removal: {}", item.id, e);
                    }
                }
                Ok(Err(e)) if e.is_permanent() => {
                    report.failed += 1;
                    if self.reject(item, &e) {
                        report.dead_lettered += 1;
                    }
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!("sync of {} failed, will retry: {}", item.id, e);
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!("sync of {} panicked, will retry", item.id);
                }
            }
        }

        report.remaining = self.queue.size();
        tracing::info!(
            "drain finished: {} synced, {} failed, {} remaining",
            report.synced,
            report.failed,
            report.remaining
        );
        report
    }

    /// Counts a permanent rejection. Returns true if the item was dead-lettered.
    fn reject(&self, item: &SyncItem, err: &RemoteError) -> bool {
        let count = match self.queue.record_rejection(&item.id) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("failed to record rejection of {}: {}", item.id, e);
                return false;
            }
        };

        if self.max_rejections == 0 || count < self.max_rejections {
            tracing::warn!(
                "sync of {} rejected ({}/{}): {}",
                item.id,
                count,
                self.max_rejections,
                err
            );
            return false;
        }

        match self.queue.dead_letter(&item.id, &err.to_string()) {
            Ok(moved) => {
                if moved {
                    tracing::error!(
                        "dead-lettered {} {} {} after {} rejections: {}",
                        item.id,
                        item.operation,
                        item.table,
                        count,
                        err
                    );
                }
                moved
            }
            Err(e) => {
                tracing::warn!("failed to dead-letter {}: {}", item.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
