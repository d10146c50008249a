// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Online/offline tracking.
//!
//! The monitor holds the last sampled connectivity and fans out one
//! [`Transition`] per edge. There is no debouncing: a flapping link produces a
//! transition for every flip.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Buffered transitions per subscriber before it starts lagging.
const TRANSITION_BUFFER: usize = 64;

/// A connectivity edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

struct MonitorInner {
    online: AtomicBool,
    tx: broadcast::Sender<Transition>,
}

/// Shared connectivity state. Clones observe the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _) = broadcast::channel(TRANSITION_BUFFER);
        ConnectivityMonitor {
            inner: Arc::new(MonitorInner {
                online: AtomicBool::new(online),
                tx,
            }),
        }
    }

    /// Last sampled connectivity.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    /// Records a new sample. Returns the transition if the state flipped.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let was_online = self.inner.online.swap(online, Ordering::AcqRel);
        if was_online == online {
            return None;
        }

        let transition = if online {
            Transition::Online
        } else {
            Transition::Offline
        };
        tracing::info!(
            "connectivity: {}",
            if online { "online" } else { "offline" }
        );
        // No subscribers is fine
        let _ = self.inner.tx.send(transition);
        Some(transition)
    }

    /// Subscribes to future transitions.
    pub fn subscribe(&self) -> Transitions {
        Transitions {
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Runs `f` on every transition to online until the monitor is dropped.
    pub fn on_online<F, Fut>(&self, f: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.on_transition(Transition::Online, f)
    }

    /// Runs `f` on every transition to offline until the monitor is dropped.
    pub fn on_offline<F, Fut>(&self, f: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.on_transition(Transition::Offline, f)
    }

    fn on_transition<F, Fut>(&self, wanted: Transition, f: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut transitions = self.subscribe();
        tokio::spawn(async move {
            while let Some(transition) = transitions.next().await {
                if transition == wanted {
                    f().await;
                }
            }
        })
    }
}

/// Stream of transitions from a [`ConnectivityMonitor`].
pub struct Transitions {
    rx: broadcast::Receiver<Transition>,
}

impl Transitions {
    /// Waits for the next transition. Returns `None` once every monitor handle
    /// is gone.
    pub async fn next(&mut self) -> Option<Transition> {
        loop {
            match self.rx.recv().await {
                Ok(transition) => return Some(transition),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("connectivity subscriber lagged by {} transitions", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
