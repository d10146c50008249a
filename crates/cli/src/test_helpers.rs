// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared across unit tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fk_core::protocol::Filter;
use fk_core::{ChangeEvent, Operation, SyncItem};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use crate::feed::{ChangeFeed, FeedError, SubscribeFuture, Subscription, SubscriptionSender};
use crate::remote::{RemoteError, RemoteFuture, RemoteStore};

pub fn insert_item(table: &str, payload: Value) -> SyncItem {
    SyncItem::new(table, Operation::Insert, payload)
}

pub fn update_item(table: &str, payload: Value) -> SyncItem {
    SyncItem::new(table, Operation::Update, payload)
}

pub fn delete_item(table: &str, payload: Value) -> SyncItem {
    SyncItem::new(table, Operation::Delete, payload)
}

/// A request seen by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub operation: Operation,
    pub table: String,
    pub filter: Option<Filter>,
    /// Rows for inserts, the patch for updates, null for deletes.
    pub body: Value,
}

/// How a scripted failure fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Permanent,
    Panic,
}

type Matcher = Box<dyn Fn(&RemoteCall) -> bool + Send + Sync>;

struct FailRule {
    matcher: Matcher,
    failure: Failure,
    /// `None` fails forever.
    remaining: Option<usize>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<RemoteCall>,
    rules: Vec<FailRule>,
    tables: HashMap<String, Vec<Map<String, Value>>>,
}

/// In-memory remote store with scripted failures.
///
/// Successful requests are applied to per-table row lists so tests can check
/// the resulting remote state.
#[derive(Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<MockState>>,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails matching calls `times` times (forever if `None`).
    pub fn fail_when<F>(&self, failure: Failure, times: Option<usize>, matcher: F)
    where
        F: Fn(&RemoteCall) -> bool + Send + Sync + 'static,
    {
        self.state.lock().unwrap().rules.push(FailRule {
            matcher: Box::new(matcher),
            failure,
            remaining: times,
        });
    }

    /// Fails every call on `table`.
    pub fn fail_table(&self, table: &str, failure: Failure) {
        let table = table.to_string();
        self.fail_when(failure, None, move |call| call.table == table);
    }

    /// Fails the next `times` calls, whatever they are.
    pub fn fail_next(&self, failure: Failure, times: usize) {
        self.fail_when(failure, Some(times), |_| true);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().rules.clear();
    }

    /// Makes every call wait for a permit on the returned semaphore.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Lets calls through again, including any currently waiting.
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    /// Every call attempted so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Rows currently stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn call(&self, call: RemoteCall) -> RemoteFuture<'_> {
        Box::pin(async move {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                // A closed gate lets everything through
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            let failure = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(call.clone());
                let failure = state.rules.iter_mut().find_map(|rule| {
                    if rule.remaining == Some(0) || !(rule.matcher)(&call) {
                        return None;
                    }
                    if let Some(n) = rule.remaining.as_mut() {
                        *n -= 1;
                    }
                    Some(rule.failure)
                });
                if failure.is_none() {
                    apply_call(&mut state.tables, &call);
                }
                failure
            };

            match failure {
                None => Ok(()),
                Some(Failure::Transient) => Err(RemoteError::Unavailable("scripted".into())),
                Some(Failure::Permanent) => Err(RemoteError::Rejected("scripted".into())),
                Some(Failure::Panic) => panic!("scripted remote panic"),
            }
        })
    }
}

fn apply_call(tables: &mut HashMap<String, Vec<Map<String, Value>>>, call: &RemoteCall) {
    let rows = tables.entry(call.table.clone()).or_default();
    match call.operation {
        Operation::Insert => {
            for row in call.body.as_array().into_iter().flatten() {
                if let Some(row) = row.as_object() {
                    rows.push(row.clone());
                }
            }
        }
        Operation::Update => {
            let (Some(filter), Some(patch)) = (&call.filter, call.body.as_object()) else {
                return;
            };
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                for (k, v) in patch {
                    row.insert(k.clone(), v.clone());
                }
            }
        }
        Operation::Delete => {
            if let Some(filter) = &call.filter {
                rows.retain(|row| !filter.matches(row));
            }
        }
    }
}

impl RemoteStore for MockRemote {
    fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteFuture<'_> {
        self.call(RemoteCall {
            operation: Operation::Insert,
            table: table.to_string(),
            filter: None,
            body: Value::Array(rows),
        })
    }

    fn update(&self, table: &str, filter: Filter, patch: Map<String, Value>) -> RemoteFuture<'_> {
        self.call(RemoteCall {
            operation: Operation::Update,
            table: table.to_string(),
            filter: Some(filter),
            body: Value::Object(patch),
        })
    }

    fn delete(&self, table: &str, filter: Filter) -> RemoteFuture<'_> {
        self.call(RemoteCall {
            operation: Operation::Delete,
            table: table.to_string(),
            filter: Some(filter),
            body: Value::Null,
        })
    }
}

/// Change feed whose events are pushed by the test.
#[derive(Clone, Default)]
pub struct MockFeed {
    senders: Arc<Mutex<Vec<(Vec<String>, SubscriptionSender)>>>,
    subscribes: Arc<AtomicUsize>,
    refusals: Arc<AtomicUsize>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses the next `n` subscribe calls.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    /// Pushes an event to every live subscription whose topics match.
    pub fn emit(&self, event: ChangeEvent) {
        let senders = self.senders.lock().unwrap();
        for (topics, sender) in senders.iter() {
            if event.matches(topics) {
                sender.try_send(event.clone());
            }
        }
    }

    /// Ends every subscription from the feed side.
    pub fn disconnect(&self) {
        self.senders.lock().unwrap().clear();
    }

    /// Subscriptions that have not been dropped.
    pub fn active(&self) -> usize {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|(_, s)| !s.is_closed());
        senders.len()
    }

    /// Subscribe calls that succeeded.
    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

impl ChangeFeed for MockFeed {
    fn subscribe(&self, topics: Vec<String>) -> SubscribeFuture<'_> {
        Box::pin(async move {
            let refused = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(FeedError::ConnectionFailed("scripted".into()));
            }

            let (sub, sender) = Subscription::channel(topics.clone());
            self.senders.lock().unwrap().push((topics, sender));
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(sub)
        })
    }
}
