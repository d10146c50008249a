// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the authoritative tables in memory and fans out one change event per
//! affected row. Last write wins: mutations apply in arrival order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};

use fk_core::protocol::Filter;
use fk_core::{ChangeEvent, ChangeKind, RECORD_ID_KEY};

type Row = Map<String, Value>;

/// Why a mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    /// False when resending the same mutation can never succeed.
    pub retryable: bool,
}

impl Rejection {
    fn permanent(message: impl Into<String>) -> Self {
        Rejection {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Shared server state containing the authoritative tables.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    tables: RwLock<Tables>,
    /// Tables every mutation is refused on.
    denied: HashSet<String>,
    /// Broadcast channel for notifying clients of row changes.
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    next_id: u64,
}

impl ServerState {
    /// Creates empty state. Mutations on `denied` tables are rejected.
    pub fn new(denied: impl IntoIterator<Item = String>) -> Self {
        // Create broadcast channel with reasonable buffer
        let (broadcast_tx, _) = broadcast::channel(1024);

        ServerState {
            inner: Arc::new(ServerStateInner {
                tables: RwLock::new(Tables::default()),
                denied: denied.into_iter().collect(),
                broadcast_tx,
            }),
        }
    }

    /// Inserts rows, assigning numeric ids to rows without one.
    ///
    /// All-or-nothing: a single bad row rejects the whole request.
    pub async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<usize, Rejection> {
        self.check_allowed(table)?;

        let mut tables = self.inner.tables.write().await;
        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(row) = row else {
                return Err(Rejection::permanent("row must be a JSON object"));
            };
            batch.push(row);
        }

        let existing = tables.rows.get(table);
        let mut seen = HashSet::new();
        for row in &batch {
            if let Some(id) = row.get(RECORD_ID_KEY) {
                let taken = existing.is_some_and(|rows| rows.iter().any(|r| r.get(RECORD_ID_KEY) == Some(id)));
                if taken || !seen.insert(id.to_string()) {
                    return Err(Rejection::permanent(format!(
                        "duplicate key: {}.{} = {}",
                        table, RECORD_ID_KEY, id
                    )));
                }
            }
        }

        let mut events = Vec::with_capacity(batch.len());
        for mut row in batch {
            if !row.contains_key(RECORD_ID_KEY) {
                tables.next_id += 1;
                row.insert(RECORD_ID_KEY.to_string(), Value::from(tables.next_id));
            }
            events.push(ChangeEvent::new(table, ChangeKind::Insert, Some(Value::Object(row.clone()))));
            tables.rows.entry(table.to_string()).or_default().push(row);
        }
        drop(tables);

        Ok(self.publish(events))
    }

    /// Merges `patch` into every row matching `filter`.
    pub async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<usize, Rejection> {
        self.check_allowed(table)?;
        if patch.contains_key(RECORD_ID_KEY) {
            return Err(Rejection::permanent("record id cannot be changed"));
        }

        let mut tables = self.inner.tables.write().await;
        let mut events = Vec::new();
        if let Some(rows) = tables.rows.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                events.push(ChangeEvent::new(table, ChangeKind::Update, Some(Value::Object(row.clone()))));
            }
        }
        drop(tables);

        Ok(self.publish(events))
    }

    /// Deletes every row matching `filter`.
    pub async fn delete(&self, table: &str, filter: &Filter) -> Result<usize, Rejection> {
        self.check_allowed(table)?;

        let mut tables = self.inner.tables.write().await;
        let mut removed = 0;
        if let Some(rows) = tables.rows.get_mut(table) {
            let before = rows.len();
            rows.retain(|row| !filter.matches(row));
            removed = before - rows.len();
        }
        drop(tables);

        let events = (0..removed)
            .map(|_| ChangeEvent::new(table, ChangeKind::Delete, None))
            .collect();
        Ok(self.publish(events))
    }

    /// Current rows of `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.inner.tables.read().await;
        tables.rows.get(table).cloned().unwrap_or_default()
    }

    /// Subscribes to change events on every table.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    fn check_allowed(&self, table: &str) -> Result<(), Rejection> {
        if self.inner.denied.contains(table) {
            return Err(Rejection::permanent(format!(
                "permission denied for table {}",
                table
            )));
        }
        Ok(())
    }

    /// Broadcasts events and returns how many there were.
    fn publish(&self, events: Vec<ChangeEvent>) -> usize {
        let count = events.len();
        for event in events {
            // Ignore send errors (no receivers is fine)
            let _ = self.inner.broadcast_tx.send(event);
        }
        count
    }
}
