// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable FIFO of pending writes.
//!
//! Every mutation of the in-memory queue is persisted before the call returns,
//! so a crash never loses an acknowledged enqueue. Items leave the queue only
//! when the remote accepted them or when they were moved to the dead-letter
//! list after repeated permanent rejections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use fk_core::{Operation, SyncItem, SyncItemId, RECORD_ID_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;

use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::store::QueueStore;

/// An item removed from active retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub item: SyncItem,
    /// Last rejection message from the remote.
    pub reason: String,
    pub rejections: u32,
    pub dead_at: DateTime<Utc>,
}

/// Result of [`WriteQueue::requeue_dead_letters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requeued {
    /// Dead letters moved back to the queue.
    pub moved: usize,
    /// Dead letters kept because a newer pending write targets the same record.
    pub held: usize,
}

/// Returns true if `newer` writes the same record as `older` after it.
fn supersedes(newer: &SyncItem, older: &SyncItem) -> bool {
    let record = |item: &SyncItem| {
        item.payload
            .get(RECORD_ID_KEY)
            .filter(|id| !id.is_null())
            .cloned()
    };
    newer.table == older.table
        && newer.timestamp >= older.timestamp
        && record(newer).is_some()
        && record(newer) == record(older)
}

/// Wakes the drain worker.
///
/// Requests made while the worker is busy collapse into one pending wakeup.
#[derive(Clone, Default)]
pub struct DrainTrigger {
    notify: Arc<Notify>,
}

impl DrainTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a drain attempt.
    pub fn request(&self) {
        self.notify.notify_one();
    }

    /// Waits for the next request.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[derive(Default)]
struct Ledger {
    items: Vec<SyncItem>,
    rejections: HashMap<SyncItemId, u32>,
    dead: Vec<DeadLetter>,
}

/// The pending-write queue. Clones share the same queue.
#[derive(Clone)]
pub struct WriteQueue {
    ledger: Arc<Mutex<Ledger>>,
    store: QueueStore,
    monitor: ConnectivityMonitor,
    trigger: DrainTrigger,
}

impl WriteQueue {
    /// Restores the queue from `store`.
    pub fn open(store: QueueStore, monitor: ConnectivityMonitor, trigger: DrainTrigger) -> Self {
        let ledger = Ledger {
            items: store.load(),
            rejections: store.load_rejections(),
            dead: store.load_dead_letters(),
        };
        if !ledger.items.is_empty() {
            tracing::info!("restored {} pending writes", ledger.items.len());
        }
        if !ledger.dead.is_empty() {
            tracing::warn!("{} writes are dead-lettered", ledger.dead.len());
        }

        WriteQueue {
            ledger: Arc::new(Mutex::new(ledger)),
            store,
            monitor,
            trigger,
        }
    }

    /// Appends a write and persists the queue.
    ///
    /// If the queue cannot be persisted the item is not kept and the error is
    /// returned. When online a drain is requested.
    pub fn enqueue(
        &self,
        table: impl Into<String>,
        operation: Operation,
        payload: Value,
    ) -> Result<SyncItemId> {
        let item = SyncItem::new(table, operation, payload);
        let id = item.id.clone();

        {
            let mut ledger = self.lock();
            tracing::debug!("enqueue {} {} {}", id, item.operation, item.table);
            ledger.items.push(item);
            if let Err(e) = self.store.save(&ledger.items) {
                ledger.items.pop();
                return Err(e);
            }
        }

        if self.monitor.is_online() {
            self.trigger.request();
        }
        Ok(id)
    }

    /// Number of pending writes.
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    /// Inverse of the connectivity monitor's state.
    pub fn is_offline(&self) -> bool {
        !self.monitor.is_online()
    }

    /// Pending writes in processing order.
    pub fn pending(&self) -> Vec<SyncItem> {
        self.lock().items.clone()
    }

    /// Rejection count recorded for a pending item.
    pub fn rejections(&self, id: &SyncItemId) -> u32 {
        self.lock().rejections.get(id).copied().unwrap_or(0)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead.clone()
    }

    /// Moves dead letters back to the tail of the queue with a fresh
    /// rejection count.
    ///
    /// A dead letter whose record has a newer pending write stays dead:
    /// replaying it behind that write would undo it.
    pub fn requeue_dead_letters(&self) -> Result<Requeued> {
        let outcome = {
            let mut ledger = self.lock();
            if ledger.dead.is_empty() {
                return Ok(Requeued::default());
            }

            let (stale, fresh): (Vec<DeadLetter>, Vec<DeadLetter>) =
                ledger.dead.iter().cloned().partition(|letter| {
                    ledger.items.iter().any(|pending| supersedes(pending, &letter.item))
                });

            let mut items = ledger.items.clone();
            items.extend(fresh.iter().map(|d| d.item.clone()));
            // Queue first: a crash in between duplicates rather than loses
            self.store.save(&items)?;
            self.store.save_dead_letters(&stale)?;

            ledger.items = items;
            ledger.dead = stale;
            Requeued {
                moved: fresh.len(),
                held: ledger.dead.len(),
            }
        };

        tracing::info!("requeued {} dead-lettered writes", outcome.moved);
        if outcome.held > 0 {
            tracing::warn!(
                "kept {} dead-lettered writes superseded by newer pending writes",
                outcome.held
            );
        }
        if outcome.moved > 0 && self.monitor.is_online() {
            self.trigger.request();
        }
        Ok(outcome)
    }

    /// Drops every dead letter. Returns how many were dropped.
    pub fn discard_dead_letters(&self) -> Result<usize> {
        let mut ledger = self.lock();
        let count = ledger.dead.len();
        if count > 0 {
            self.store.save_dead_letters(&[])?;
            ledger.dead.clear();
            tracing::info!("discarded {} dead-lettered writes", count);
        }
        Ok(count)
    }

    pub(crate) fn trigger(&self) -> &DrainTrigger {
        &self.trigger
    }

    pub(crate) fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Copy of the queue to iterate during a drain pass.
    pub(crate) fn snapshot(&self) -> Vec<SyncItem> {
        self.pending()
    }

    /// Removes a synced item. Returns false if it was no longer queued.
    ///
    /// The item stays removed from memory even if persisting fails, so it is
    /// not sent twice by this process.
    pub(crate) fn remove(&self, id: &SyncItemId) -> Result<bool> {
        let mut ledger = self.lock();
        let Some(pos) = ledger.items.iter().position(|item| &item.id == id) else {
            return Ok(false);
        };
        ledger.items.remove(pos);
        self.store.save(&ledger.items)?;

        if ledger.rejections.remove(id).is_some() {
            self.store.save_rejections(&ledger.rejections)?;
        }
        Ok(true)
    }

    /// Counts a permanent rejection. Returns the new count.
    pub(crate) fn record_rejection(&self, id: &SyncItemId) -> Result<u32> {
        let mut ledger = self.lock();
        let count = {
            let count = ledger.rejections.entry(id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.store.save_rejections(&ledger.rejections)?;
        Ok(count)
    }

    /// Moves a pending item to the dead-letter list. Returns false if it was
    /// no longer queued.
    pub(crate) fn dead_letter(&self, id: &SyncItemId, reason: &str) -> Result<bool> {
        let mut ledger = self.lock();
        let Some(pos) = ledger.items.iter().position(|item| &item.id == id) else {
            return Ok(false);
        };

        let rejections = ledger.rejections.get(id).copied().unwrap_or(0);
        let letter = DeadLetter {
            item: ledger.items[pos].clone(),
            reason: reason.to_string(),
            rejections,
            dead_at: Utc::now(),
        };

        let mut dead = ledger.dead.clone();
        dead.push(letter);
        // Dead letters first: a crash in between duplicates rather than loses
        self.store.save_dead_letters(&dead)?;
        ledger.dead = dead;

        ledger.items.remove(pos);
        self.store.save(&ledger.items)?;

        if ledger.rejections.remove(id).is_some() {
            self.store.save_rejections(&ledger.rejections)?;
        }
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
