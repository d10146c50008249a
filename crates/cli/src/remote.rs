// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote store boundary.
//!
//! The engine needs three primitives per table: insert rows, update rows
//! matching a filter, delete rows matching a filter. [`RemoteStore`] abstracts
//! them so tests can swap in a mock, and [`WebSocketRemote`] speaks the
//! fk-core protocol to a real server.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fk_core::item::{record_id, split_record_id};
use fk_core::protocol::{ClientMessage, Filter, ServerMessage};
use fk_core::{Operation, SyncItem};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::RemoteConfig;

/// Error type for remote operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// No answer within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection closed before the answer arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The remote refused the request and will refuse it again.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// The item cannot be turned into a request.
    #[error("invalid payload: {0}")]
    Payload(#[from] fk_core::Error),

    /// Unexpected frame or encoding failure.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Returns true if retrying the same request can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, RemoteError::Rejected(_) | RemoteError::Payload(_))
    }

    /// Returns true if the connection should be discarded after this error.
    fn breaks_connection(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_)
                | RemoteError::Timeout
                | RemoteError::ConnectionClosed
                | RemoteError::Protocol(_)
        )
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`RemoteStore`] methods.
pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = RemoteResult<()>> + Send + 'a>>;

/// The authoritative data store.
///
/// Conflict handling (last write wins) is entirely the remote's business.
pub trait RemoteStore: Send + Sync {
    /// Inserts new rows.
    fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteFuture<'_>;

    /// Merges `patch` into the rows matching `filter`.
    fn update(&self, table: &str, filter: Filter, patch: Map<String, Value>) -> RemoteFuture<'_>;

    /// Deletes the rows matching `filter`.
    fn delete(&self, table: &str, filter: Filter) -> RemoteFuture<'_>;
}

/// Sends one queued item to the remote.
///
/// - INSERT: the payload is the new row
/// - UPDATE: the record id is stripped from the payload and used as the filter
/// - DELETE: the record id is used as the filter
pub async fn apply(remote: &dyn RemoteStore, item: &SyncItem) -> RemoteResult<()> {
    match item.operation {
        Operation::Insert => remote.insert(&item.table, vec![item.payload.clone()]).await,
        Operation::Update => {
            let (id, patch) = split_record_id(&item.payload)?;
            remote.update(&item.table, Filter::record(id), patch).await
        }
        Operation::Delete => {
            let id = record_id(&item.payload)?;
            remote.delete(&item.table, Filter::record(id)).await
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Remote store reached over WebSocket.
///
/// Connects lazily on the first request and reconnects after any transport
/// failure. Requests on one instance are serialized.
pub struct WebSocketRemote {
    url: String,
    request_timeout: Duration,
    next_request_id: AtomicU64,
    conn: Mutex<Option<WsStream>>,
}

impl WebSocketRemote {
    /// Creates a remote for the configured URL. Does not connect.
    pub fn new(config: &RemoteConfig) -> Self {
        WebSocketRemote {
            url: config.url.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            next_request_id: AtomicU64::new(1),
            conn: Mutex::new(None),
        }
    }

    async fn request<F>(&self, make: F) -> RemoteResult<()>
    where
        F: FnOnce(u64) -> ClientMessage + Send,
    {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let json = make(request_id)
            .to_json()
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;

        let mut conn = self.conn.lock().await;
        let result = tokio::time::timeout(self.request_timeout, async {
            if conn.is_none() {
                let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
                    .await
                    .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
                *conn = Some(ws);
            }
            let ws = conn.as_mut().ok_or(RemoteError::ConnectionClosed)?;
            exchange(ws, json, request_id).await
        })
        .await
        .unwrap_or(Err(RemoteError::Timeout));

        if let Err(ref e) = result {
            if e.breaks_connection() {
                *conn = None;
            }
        }
        result
    }
}

/// Sends one request frame and waits for its answer, skipping unrelated frames.
async fn exchange(ws: &mut WsStream, json: String, request_id: u64) -> RemoteResult<()> {
    ws.send(Message::Text(json.into()))
        .await
        .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let msg = ServerMessage::from_json(&text)
                    .map_err(|e| RemoteError::Protocol(e.to_string()))?;
                match msg {
                    ServerMessage::Ack {
                        request_id: id, ..
                    } if id == request_id => return Ok(()),
                    ServerMessage::Error {
                        request_id: Some(id),
                        message,
                        retryable,
                    } if id == request_id => {
                        return Err(if retryable {
                            RemoteError::Unavailable(message)
                        } else {
                            RemoteError::Rejected(message)
                        });
                    }
                    ServerMessage::Error {
                        request_id: None,
                        message,
                        ..
                    } => return Err(RemoteError::Protocol(message)),
                    // Stale answers and change events
                    _ => continue,
                }
            }
            Some(Ok(Message::Close(_))) | None => return Err(RemoteError::ConnectionClosed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(RemoteError::Unavailable(e.to_string())),
        }
    }
}

impl RemoteStore for WebSocketRemote {
    fn insert(&self, table: &str, rows: Vec<Value>) -> RemoteFuture<'_> {
        let table = table.to_string();
        Box::pin(async move {
            self.request(|id| ClientMessage::insert(id, table, rows))
                .await
        })
    }

    fn update(&self, table: &str, filter: Filter, patch: Map<String, Value>) -> RemoteFuture<'_> {
        let table = table.to_string();
        Box::pin(async move {
            self.request(|id| ClientMessage::update(id, table, filter, patch))
                .await
        })
    }

    fn delete(&self, table: &str, filter: Filter) -> RemoteFuture<'_> {
        let table = table.to_string();
        Box::pin(async move {
            self.request(|id| ClientMessage::delete(id, table, filter))
                .await
        })
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
