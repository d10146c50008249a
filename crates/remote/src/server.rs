// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, request routing, and change event fanout to
//! connections subscribed to the event's table.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use fk_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{Rejection, ServerState};

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe to broadcasts up front; events only go out once the client
    // has subscribed to a matching topic.
    let mut broadcast_rx = state.subscribe();
    let mut topics: Option<Vec<String>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(response) = handle_client_message(text.as_str(), &state, &mut topics).await {
                            let json = response.to_json()?;
                            ws_sink.send(Message::Text(json.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types (Binary, Pong, Frame)
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            // Forward change events the client subscribed to
            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(event) => {
                        let wanted = topics.as_deref().is_some_and(|topics| event.matches(topics));
                        if !wanted {
                            continue;
                        }
                        let json = ServerMessage::change(event).to_json()?;
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send change to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} events", peer_addr, n);
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client message and return an optional response.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
    topics: &mut Option<Vec<String>>,
) -> Option<ServerMessage> {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Unparseable frame: {}", e);
            return Some(ServerMessage::error(None, format!("invalid message: {}", e), false));
        }
    };
    debug!("Received message: {:?}", msg);

    let (request_id, result) = match msg {
        ClientMessage::Insert {
            request_id,
            table,
            rows,
        } => (request_id, state.insert(&table, rows).await),

        ClientMessage::Update {
            request_id,
            table,
            filter,
            patch,
        } => (request_id, state.update(&table, &filter, patch).await),

        ClientMessage::Delete {
            request_id,
            table,
            filter,
        } => (request_id, state.delete(&table, &filter).await),

        ClientMessage::Subscribe { topics: requested } => {
            debug!("Subscribed to {:?}", requested);
            *topics = Some(requested.clone());
            return Some(ServerMessage::subscribed(requested));
        }

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            return Some(ServerMessage::pong(id));
        }
    };

    Some(match result {
        Ok(affected) => {
            debug!("Request {} affected {} rows", request_id, affected);
            ServerMessage::ack(request_id, affected)
        }
        Err(Rejection { message, retryable }) => {
            debug!("Request {} rejected: {}", request_id, message);
            ServerMessage::error(Some(request_id), message, retryable)
        }
    })
}
