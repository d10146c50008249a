// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change relay.
//!
//! While a user is signed in the relay keeps exactly one feed subscription on
//! the configured topics. Every event triggers a full refresh of remote state;
//! new prayer requests additionally raise a transient notice for privileged
//! roles. If the feed connection ends the relay resubscribes with backoff.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fk_core::{ChangeEvent, ChangeKind};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::feed::{ChangeFeed, Subscription};

/// Refetches all remote state. Must be cheap to call repeatedly.
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// Signed-in user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Leader,
    Member,
}

impl Role {
    /// Roles that see prayer request notices.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Leader)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Leader => "leader",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "leader" => Ok(Role::Leader),
            "member" => Ok(Role::Member),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Default)]
struct Board {
    next_id: u64,
    notices: Vec<Notice>,
}

/// Active notices. Each notice dismisses itself after its time to live.
#[derive(Clone)]
pub struct NoticeBoard {
    board: Arc<Mutex<Board>>,
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(16);
        NoticeBoard {
            board: Arc::default(),
            tx,
        }
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a notice that disappears after `ttl`. Returns its id.
    pub fn post(&self, message: impl Into<String>, ttl: Duration) -> u64 {
        let notice = {
            let mut board = self.lock();
            board.next_id += 1;
            let notice = Notice {
                id: board.next_id,
                message: message.into(),
                posted_at: Utc::now(),
            };
            board.notices.push(notice.clone());
            notice
        };
        let id = notice.id;
        tracing::info!("notice: {}", notice.message);
        let _ = self.tx.send(notice);

        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            board.dismiss(id);
        });
        id
    }

    /// Removes a notice. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut board = self.lock();
        let before = board.notices.len();
        board.notices.retain(|n| n.id != id);
        board.notices.len() != before
    }

    /// Notices currently visible, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    /// Receives every notice posted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Relay tuning.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub topics: Vec<String>,
    pub prayer_topic: String,
    pub notice_ttl: Duration,
    /// First resubscribe delay after the feed drops.
    pub reconnect_initial: Duration,
    /// Resubscribe delay cap.
    pub reconnect_max: Duration,
}

impl From<&FeedConfig> for RelaySettings {
    fn from(config: &FeedConfig) -> Self {
        RelaySettings {
            topics: config.topics.clone(),
            prayer_topic: config.prayer_topic.clone(),
            notice_ttl: Duration::from_secs(config.notice_ttl_secs),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

struct Session {
    role: Role,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

/// Bridges the change feed to refreshes and notices for a signed-in session.
pub struct ChangeRelay {
    feed: Arc<dyn ChangeFeed>,
    settings: RelaySettings,
    refresh: RefreshFn,
    notices: NoticeBoard,
    session: Option<Session>,
}

impl ChangeRelay {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        settings: RelaySettings,
        refresh: RefreshFn,
        notices: NoticeBoard,
    ) -> Self {
        ChangeRelay {
            feed,
            settings,
            refresh,
            notices,
            session: None,
        }
    }

    /// Starts the session's subscription, replacing any previous one.
    pub async fn sign_in(&mut self, role: Role) -> Result<()> {
        self.sign_out();

        let sub = self.feed.subscribe(self.settings.topics.clone()).await?;
        tracing::info!("signed in as {}, relaying changes", role);

        let cancel_token = CancellationToken::new();
        let dispatcher = Dispatcher {
            feed: Arc::clone(&self.feed),
            settings: self.settings.clone(),
            refresh: Arc::clone(&self.refresh),
            notices: self.notices.clone(),
            role,
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(dispatcher.run(sub));

        self.session = Some(Session {
            role,
            cancel_token,
            task,
        });
        Ok(())
    }

    /// Ends the session's subscription. No-op when signed out.
    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel_token.cancel();
            session.task.abort();
            tracing::info!("signed out {}, change relay stopped", session.role);
        }
    }

    /// Returns true while a session is active and its dispatcher is alive.
    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }
}

impl Drop for ChangeRelay {
    fn drop(&mut self) {
        self.sign_out();
    }
}

struct Dispatcher {
    feed: Arc<dyn ChangeFeed>,
    settings: RelaySettings,
    refresh: RefreshFn,
    notices: NoticeBoard,
    role: Role,
    cancel_token: CancellationToken,
}

impl Dispatcher {
    async fn run(self, mut sub: Subscription) {
        loop {
            loop {
                tokio::select! {
                    _ = self.cancel_token.cancelled() => return,
                    event = sub.next() => match event {
                        Some(event) => self.handle(&event),
                        None => break,
                    },
                }
            }

            tracing::warn!("change feed ended, resubscribing");
            match self.resubscribe().await {
                Some(next) => sub = next,
                None => return,
            }
            // Changes may have been missed while disconnected
            (self.refresh)();
        }
    }

    /// Retries with exponential backoff. Returns `None` once cancelled.
    async fn resubscribe(&self) -> Option<Subscription> {
        let mut delay = self.settings.reconnect_initial;
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.feed.subscribe(self.settings.topics.clone()).await {
                Ok(sub) => {
                    tracing::info!("change feed resubscribed");
                    return Some(sub);
                }
                Err(e) => {
                    tracing::warn!("resubscribe failed, retrying in {:?}: {}", delay, e);
                    delay = (delay * 2).min(self.settings.reconnect_max);
                }
            }
        }
    }

    fn handle(&self, event: &ChangeEvent) {
        tracing::debug!("change in {}: {:?}", event.table, event.kind);
        (self.refresh)();

        if event.table == self.settings.prayer_topic
            && event.kind == ChangeKind::Insert
            && self.role.is_privileged()
        {
            self.notices
                .post(prayer_notice(event.new_row.as_ref()), self.settings.notice_ttl);
        }
    }
}

fn prayer_notice(row: Option<&Value>) -> String {
    match row.and_then(|r| r.get("name")).and_then(Value::as_str) {
        Some(name) => format!("New prayer request from {}", name),
        None => "New prayer request".to_string(),
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
