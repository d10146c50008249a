// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test server utilities and protocol tests.
//!
//! Provides a TestServer that runs on a random port so tests can drive the
//! real connection handler over a WebSocket.

#![cfg(test)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use fk_core::protocol::{ClientMessage, Filter, ServerMessage};
use fk_core::ChangeKind;

use crate::server;
use crate::state::ServerState;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A test server that runs on a random port and can be controlled.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    state: ServerState,
}

impl TestServer {
    /// Start a new test server on a random available port.
    pub async fn start() -> Self {
        Self::with_denied(Vec::new()).await
    }

    /// Start a server that refuses every mutation on `denied` tables.
    pub async fn with_denied(denied: Vec<String>) -> Self {
        let state = ServerState::new(denied);

        // Bind to port 0 to get a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state_clone = state.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = accept_loop(listener, state_clone) => {
                    if let Err(e) = result {
                        eprintln!("Test server error: {}", e);
                    }
                }
                _ = shutdown_rx => {}
            }
        });

        TestServer {
            addr,
            shutdown_tx,
            state,
        }
    }

    /// Get the WebSocket URL for connecting to this server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get access to the server state for verification.
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Shutdown the test server.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Accept loop that uses the actual server::handle_connection.
async fn accept_loop(
    listener: TcpListener,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            let _ = server::handle_connection(stream, peer_addr, state).await;
        });
    }
}

/// Connected test client.
struct Client {
    sink: SplitSink<Ws, Message>,
    stream: SplitStream<Ws>,
}

impl Client {
    async fn connect(server: &TestServer) -> Self {
        let (ws, _) = connect_async(server.ws_url()).await.unwrap();
        let (sink, stream) = ws.split();
        Client { sink, stream }
    }

    async fn send(&mut self, msg: ClientMessage) {
        self.send_raw(&msg.to_json().unwrap()).await;
    }

    async fn send_raw(&mut self, text: &str) {
        self.sink.send(Message::Text(text.into())).await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        loop {
            match timeout(Duration::from_secs(5), self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return ServerMessage::from_json(text.as_str()).unwrap()
                }
                Ok(Some(Ok(_))) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    /// Returns true if nothing arrives within a short window.
    async fn is_quiet(&mut self) -> bool {
        timeout(Duration::from_millis(200), self.stream.next())
            .await
            .is_err()
    }

    async fn subscribe(&mut self, topics: &[&str]) {
        let topics: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        self.send(ClientMessage::subscribe(topics.clone())).await;
        assert_eq!(self.recv().await, ServerMessage::subscribed(topics));
    }
}

#[tokio::test]
async fn test_ping_pong() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;

    client.send(ClientMessage::ping(42)).await;

    assert_eq!(client.recv().await, ServerMessage::pong(42));
    server.shutdown();
}

#[tokio::test]
async fn test_insert_is_acked_and_stored() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;

    client
        .send(ClientMessage::insert(
            1,
            "members",
            vec![json!({"name": "Ada"}), json!({"id": 10, "name": "Bo"})],
        ))
        .await;

    assert_eq!(client.recv().await, ServerMessage::ack(1, 2));
    let rows = server.state().rows("members").await;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains_key("id"), "missing id gets assigned");
    assert_eq!(rows[1]["id"], json!(10));
}

#[tokio::test]
async fn test_update_merges_patch_into_matching_rows() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;
    client
        .send(ClientMessage::insert(1, "events", vec![json!({"id": 1, "title": "Picnic", "day": "Sat"})]))
        .await;
    client.recv().await;

    let patch = json!({"title": "Potluck"}).as_object().cloned().unwrap();
    client
        .send(ClientMessage::update(2, "events", Filter::record(json!(1)), patch))
        .await;

    assert_eq!(client.recv().await, ServerMessage::ack(2, 1));
    let rows = server.state().rows("events").await;
    assert_eq!(rows[0]["title"], "Potluck");
    assert_eq!(rows[0]["day"], "Sat");
}

#[tokio::test]
async fn test_update_without_match_affects_nothing() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;

    let patch = json!({"title": "x"}).as_object().cloned().unwrap();
    client
        .send(ClientMessage::update(7, "events", Filter::record(json!(99)), patch))
        .await;

    assert_eq!(client.recv().await, ServerMessage::ack(7, 0));
}

#[tokio::test]
async fn test_delete_removes_matching_rows() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;
    client
        .send(ClientMessage::insert(1, "attendance", vec![json!({"id": 1}), json!({"id": 2})]))
        .await;
    client.recv().await;

    client
        .send(ClientMessage::delete(2, "attendance", Filter::record(json!(1))))
        .await;

    assert_eq!(client.recv().await, ServerMessage::ack(2, 1));
    let rows = server.state().rows("attendance").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(2));
}

#[tokio::test]
async fn test_duplicate_id_is_rejected_permanently() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;
    client
        .send(ClientMessage::insert(1, "members", vec![json!({"id": 5})]))
        .await;
    client.recv().await;

    client
        .send(ClientMessage::insert(2, "members", vec![json!({"id": 5})]))
        .await;

    match client.recv().await {
        ServerMessage::Error {
            request_id,
            message,
            retryable,
        } => {
            assert_eq!(request_id, Some(2));
            assert!(message.contains("duplicate key"));
            assert!(!retryable);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(server.state().rows("members").await.len(), 1);
}

#[tokio::test]
async fn test_denied_table_is_rejected() {
    let server = TestServer::with_denied(vec!["finances".to_string()]).await;
    let mut client = Client::connect(&server).await;

    client
        .send(ClientMessage::insert(3, "finances", vec![json!({"amount": 10})]))
        .await;

    match client.recv().await {
        ServerMessage::Error {
            request_id,
            message,
            retryable,
        } => {
            assert_eq!(request_id, Some(3));
            assert!(message.contains("permission denied"));
            assert!(!retryable);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(server.state().rows("finances").await.is_empty());
}

#[tokio::test]
async fn test_changes_reach_only_matching_subscribers() {
    let server = TestServer::start().await;
    let mut watcher = Client::connect(&server).await;
    let mut bystander = Client::connect(&server).await;
    let mut writer = Client::connect(&server).await;
    watcher.subscribe(&["prayer_requests"]).await;
    bystander.subscribe(&["events"]).await;

    writer
        .send(ClientMessage::insert(1, "prayer_requests", vec![json!({"name": "Ada"})]))
        .await;
    assert_eq!(writer.recv().await, ServerMessage::ack(1, 1));

    match watcher.recv().await {
        ServerMessage::Change(event) => {
            assert_eq!(event.table, "prayer_requests");
            assert_eq!(event.kind, ChangeKind::Insert);
            assert_eq!(event.new_row.unwrap()["name"], "Ada");
        }
        other => panic!("expected change, got {:?}", other),
    }
    assert!(bystander.is_quiet().await);
    assert!(writer.is_quiet().await, "unsubscribed connections get no changes");
}

#[tokio::test]
async fn test_delete_event_has_no_row() {
    let server = TestServer::start().await;
    let mut watcher = Client::connect(&server).await;
    watcher.subscribe(&["events"]).await;
    server
        .state()
        .insert("events", vec![json!({"id": 1})])
        .await
        .unwrap();
    watcher.recv().await;

    server
        .state()
        .delete("events", &Filter::record(json!(1)))
        .await
        .unwrap();

    match watcher.recv().await {
        ServerMessage::Change(event) => {
            assert_eq!(event.kind, ChangeKind::Delete);
            assert!(event.new_row.is_none());
        }
        other => panic!("expected change, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_frame_gets_connection_level_error() {
    let server = TestServer::start().await;
    let mut client = Client::connect(&server).await;

    client.send_raw("{not json").await;

    match client.recv().await {
        ServerMessage::Error {
            request_id,
            retryable,
            ..
        } => {
            assert_eq!(request_id, None);
            assert!(!retryable);
        }
        other => panic!("expected error, got {:?}", other),
    }

    // The connection stays usable.
    client.send(ClientMessage::ping(1)).await;
    assert_eq!(client.recv().await, ServerMessage::pong(1));
}

#[tokio::test]
async fn test_patch_changing_id_is_rejected() {
    let state = ServerState::new(Vec::new());
    state.insert("members", vec![json!({"id": 1})]).await.unwrap();

    let patch = json!({"id": 2}).as_object().cloned().unwrap();
    let err = state
        .update("members", &Filter::record(json!(1)), patch)
        .await
        .unwrap_err();

    assert!(!err.retryable);
    assert_eq!(state.rows("members").await[0]["id"], json!(1));
}

#[tokio::test]
async fn test_non_object_row_rejects_whole_batch() {
    let state = ServerState::new(Vec::new());

    let err = state
        .insert("members", vec![json!({"name": "Ada"}), json!(3)])
        .await
        .unwrap_err();

    assert!(!err.retryable);
    assert!(state.rows("members").await.is_empty());
}
