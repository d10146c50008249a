// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine.
//!
//! Wires the write queue, the reconciler and connectivity together and runs
//! the background drain worker. The worker drains when:
//! - a write is enqueued while online
//! - connectivity comes back
//! - the optional drain interval elapses
//!
//! After a drain that synced anything, the refresh callback runs so the
//! application refetches authoritative state.

use std::sync::Arc;
use std::time::Duration;

use fk_core::{Operation, SyncItem, SyncItemId};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SyncPolicy;
use crate::connectivity::{ConnectivityMonitor, Transition, Transitions};
use crate::error::Result;
use crate::queue::{DeadLetter, DrainTrigger, Requeued, WriteQueue};
use crate::reconciler::{DrainReport, Reconciler};
use crate::relay::RefreshFn;
use crate::remote::{apply, RemoteStore};
use crate::store::{KvStore, QueueStore};

/// What [`SyncEngine::write`] did with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Sent straight to the remote and accepted.
    Applied,
    /// Queued for the next drain.
    Queued(SyncItemId),
}

/// Point-in-time engine summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub online: bool,
    pub pending: usize,
    pub dead_letters: usize,
    pub draining: bool,
}

/// The offline-tolerant sync engine.
pub struct SyncEngine {
    queue: WriteQueue,
    reconciler: Arc<Reconciler>,
    remote: Arc<dyn RemoteStore>,
    monitor: ConnectivityMonitor,
    refresh: RefreshFn,
    drain_interval: Option<Duration>,
    cancel_token: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Restores the queue from `kv`. The worker is not started.
    pub fn new(
        policy: &SyncPolicy,
        kv: Arc<dyn KvStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: ConnectivityMonitor,
        refresh: RefreshFn,
    ) -> Self {
        let queue = WriteQueue::open(QueueStore::new(kv), monitor.clone(), DrainTrigger::new());
        let reconciler = Arc::new(Reconciler::new(queue.clone(), Arc::clone(&remote), policy));
        let drain_interval =
            (policy.drain_interval_secs > 0).then(|| Duration::from_secs(policy.drain_interval_secs));

        SyncEngine {
            queue,
            reconciler,
            remote,
            monitor,
            refresh,
            drain_interval,
            cancel_token: CancellationToken::new(),
            worker: None,
        }
    }

    /// Starts the drain worker. Calling it again is a no-op.
    ///
    /// Restored writes are drained right away if online.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        let worker = Worker {
            reconciler: Arc::clone(&self.reconciler),
            trigger: self.queue.trigger().clone(),
            refresh: Arc::clone(&self.refresh),
            cancel_token: self.cancel_token.clone(),
        };
        let transitions = self.monitor.subscribe();
        let ticker = self.drain_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        if self.monitor.is_online() && self.queue.size() > 0 {
            self.queue.trigger().request();
        }
        self.worker = Some(tokio::spawn(worker.run(transitions, ticker)));
        tracing::debug!("sync worker started");
    }

    /// Queues a write. See [`WriteQueue::enqueue`].
    pub fn enqueue(
        &self,
        table: impl Into<String>,
        operation: Operation,
        payload: Value,
    ) -> Result<SyncItemId> {
        self.queue.enqueue(table, operation, payload)
    }

    /// Writes through to the remote when online with nothing queued, and
    /// queues otherwise.
    ///
    /// Bypassing the queue while it still holds items would let this write
    /// overtake older writes to the same record.
    pub async fn write(
        &self,
        table: impl Into<String>,
        operation: Operation,
        payload: Value,
    ) -> Result<WriteOutcome> {
        if self.monitor.is_online() && self.queue.size() == 0 {
            let item = SyncItem::new(table, operation, payload);
            apply(self.remote.as_ref(), &item).await?;
            return Ok(WriteOutcome::Applied);
        }

        let id = self.queue.enqueue(table, operation, payload)?;
        Ok(WriteOutcome::Queued(id))
    }

    /// Drains now, then refreshes if anything synced.
    pub async fn drain(&self) -> DrainReport {
        let report = self.reconciler.drain().await;
        if report.synced > 0 {
            (self.refresh)();
        }
        report
    }

    pub fn size(&self) -> usize {
        self.queue.size()
    }

    pub fn is_offline(&self) -> bool {
        self.queue.is_offline()
    }

    pub fn pending(&self) -> Vec<SyncItem> {
        self.queue.pending()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.queue.dead_letters()
    }

    pub fn requeue_dead_letters(&self) -> Result<Requeued> {
        self.queue.requeue_dead_letters()
    }

    pub fn discard_dead_letters(&self) -> Result<usize> {
        self.queue.discard_dead_letters()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.monitor.is_online(),
            pending: self.queue.size(),
            dead_letters: self.queue.dead_letters().len(),
            draining: self.reconciler.is_running(),
        }
    }

    /// Stops the worker, letting an in-flight drain finish.
    pub async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!("sync worker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct Worker {
    reconciler: Arc<Reconciler>,
    trigger: DrainTrigger,
    refresh: RefreshFn,
    cancel_token: CancellationToken,
}

impl Worker {
    async fn run(self, mut transitions: Transitions, mut ticker: Option<Interval>) {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = self.trigger.notified() => {}
                transition = transitions.next() => match transition {
                    Some(Transition::Online) => tracing::info!("back online, draining queued writes"),
                    Some(Transition::Offline) => continue,
                    None => break,
                },
                _ = tick(&mut ticker) => {}
            }

            let report = self.reconciler.drain().await;
            if report.synced > 0 {
                (self.refresh)();
            }
        }
        tracing::debug!("sync worker stopped");
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
