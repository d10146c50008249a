// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime change feed.
//!
//! A [`ChangeFeed`] opens a [`Subscription`] on a set of topics. Events arrive
//! on the subscription until it is dropped or unsubscribed, or until the
//! feed's connection ends.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fk_core::protocol::{ClientMessage, ServerMessage};
use fk_core::ChangeEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::RemoteConfig;

/// Events buffered per subscription before the feed waits on the consumer.
const EVENT_BUFFER: usize = 256;

/// Error type for feed operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to connect to change feed: {0}")]
    ConnectionFailed(String),

    #[error("subscription refused: {0}")]
    SubscribeFailed(String),

    #[error("change feed connection closed")]
    ConnectionClosed,

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Boxed future returned by [`ChangeFeed::subscribe`].
pub type SubscribeFuture<'a> = Pin<Box<dyn Future<Output = FeedResult<Subscription>> + Send + 'a>>;

/// Source of change events.
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription on `topics`.
    fn subscribe(&self, topics: Vec<String>) -> SubscribeFuture<'_>;
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    topics: Vec<String>,
    events: mpsc::Receiver<ChangeEvent>,
    cancel_token: CancellationToken,
}

impl Subscription {
    /// Creates a subscription and the sender half a feed pushes events into.
    pub fn channel(topics: Vec<String>) -> (Subscription, SubscriptionSender) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel_token = CancellationToken::new();
        let sub = Subscription {
            topics,
            events: rx,
            cancel_token: cancel_token.clone(),
        };
        (sub, SubscriptionSender { tx, cancel_token })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Waits for the next event. Returns `None` once the feed has ended or the
    /// subscription was cancelled.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        tokio::select! {
            _ = self.cancel_token.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Feed-side handle of a [`Subscription`].
pub struct SubscriptionSender {
    tx: mpsc::Sender<ChangeEvent>,
    cancel_token: CancellationToken,
}

impl SubscriptionSender {
    /// Delivers an event. Returns false once the subscriber is gone.
    pub async fn send(&self, event: ChangeEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(event).await.is_ok()
    }

    /// Delivers an event without waiting. A full buffer drops the event.
    pub fn try_send(&self, event: ChangeEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!("subscriber lagging, dropped {} event", event.table);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the subscriber is gone.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel_token.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// Change feed served by the remote over WebSocket.
///
/// Each subscription owns its own connection.
pub struct WebSocketFeed {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketFeed {
    pub fn new(config: &RemoteConfig) -> Self {
        WebSocketFeed {
            url: config.url.clone(),
            connect_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    async fn open(&self, topics: Vec<String>) -> FeedResult<Subscription> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        let json = ClientMessage::subscribe(topics.clone())
            .to_json()
            .map_err(|e| FeedError::Serialization(e.to_string()))?;
        ws.send(Message::Text(json.into()))
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        // Wait for the server to confirm before handing out the subscription
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    match ServerMessage::from_json(&text)
                        .map_err(|e| FeedError::Serialization(e.to_string()))?
                    {
                        ServerMessage::Subscribed { .. } => break,
                        ServerMessage::Error { message, .. } => {
                            return Err(FeedError::SubscribeFailed(message))
                        }
                        _ => continue,
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Err(FeedError::ConnectionClosed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(FeedError::ConnectionFailed(e.to_string())),
            }
        }

        let (sub, sender) = Subscription::channel(topics);
        let wanted = sub.topics().to_vec();
        tracing::info!("subscribed to {} topics", wanted.len());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sender.closed() => {
                        let _ = ws.close(None).await;
                        tracing::debug!("change feed unsubscribed");
                        break;
                    }
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                            Ok(ServerMessage::Change(event)) if event.matches(&wanted) => {
                                if !sender.send(event).await {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("ignoring unreadable feed frame: {}", e),
                        },
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::warn!("change feed closed by remote");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("change feed error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        Ok(sub)
    }
}

impl ChangeFeed for WebSocketFeed {
    fn subscribe(&self, topics: Vec<String>) -> SubscribeFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(self.connect_timeout, self.open(topics)).await {
                Ok(result) => result,
                Err(_) => Err(FeedError::ConnectionFailed("timed out".to_string())),
            }
        })
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
