// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between the engine and the remote store.
//!
//! The protocol is simple:
//! - Client sends row mutations (each tagged with a request id) and topic
//!   subscriptions
//! - Server acknowledges or rejects each mutation and pushes change events for
//!   subscribed topics

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::change::ChangeEvent;
use crate::item::RECORD_ID_KEY;

/// Equality filter selecting the rows a mutation applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    /// Matches rows whose `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Filter {
            column: column.into(),
            value,
        }
    }

    /// Matches the row with the given record id.
    pub fn record(id: Value) -> Self {
        Filter::eq(RECORD_ID_KEY, id)
    }

    /// Returns true if `row` satisfies the filter.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Insert new rows.
    Insert {
        request_id: u64,
        table: String,
        rows: Vec<Value>,
    },

    /// Merge `patch` into every row matching `filter`.
    Update {
        request_id: u64,
        table: String,
        filter: Filter,
        patch: Map<String, Value>,
    },

    /// Delete every row matching `filter`.
    Delete {
        request_id: u64,
        table: String,
        filter: Filter,
    },

    /// Start receiving change events for the given topics.
    ///
    /// Replaces any previous subscription on the connection.
    Subscribe { topics: Vec<String> },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A mutation was applied.
    Ack {
        request_id: u64,
        /// Rows inserted, updated or deleted.
        affected: usize,
    },

    /// A request failed, or the server hit a connection-level problem.
    Error {
        /// The failed request, if the error belongs to one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        /// Human-readable error description.
        message: String,
        /// False when resending the same request can never succeed.
        retryable: bool,
    },

    /// A row changed in a subscribed topic.
    Change(ChangeEvent),

    /// Confirms a Subscribe request.
    Subscribed { topics: Vec<String> },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },
}

impl ClientMessage {
    /// Creates an Insert message.
    pub fn insert(request_id: u64, table: impl Into<String>, rows: Vec<Value>) -> Self {
        ClientMessage::Insert {
            request_id,
            table: table.into(),
            rows,
        }
    }

    /// Creates an Update message.
    pub fn update(
        request_id: u64,
        table: impl Into<String>,
        filter: Filter,
        patch: Map<String, Value>,
    ) -> Self {
        ClientMessage::Update {
            request_id,
            table: table.into(),
            filter,
            patch,
        }
    }

    /// Creates a Delete message.
    pub fn delete(request_id: u64, table: impl Into<String>, filter: Filter) -> Self {
        ClientMessage::Delete {
            request_id,
            table: table.into(),
            filter,
        }
    }

    /// Creates a Subscribe message.
    pub fn subscribe(topics: Vec<String>) -> Self {
        ClientMessage::Subscribe { topics }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Returns the request id of a mutation message.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ClientMessage::Insert { request_id, .. }
            | ClientMessage::Update { request_id, .. }
            | ClientMessage::Delete { request_id, .. } => Some(*request_id),
            ClientMessage::Subscribe { .. } | ClientMessage::Ping { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Ack message.
    pub fn ack(request_id: u64, affected: usize) -> Self {
        ServerMessage::Ack {
            request_id,
            affected,
        }
    }

    /// Creates an Error message for a failed request.
    pub fn error(request_id: Option<u64>, message: impl Into<String>, retryable: bool) -> Self {
        ServerMessage::Error {
            request_id,
            message: message.into(),
            retryable,
        }
    }

    /// Creates a Change message.
    pub fn change(event: ChangeEvent) -> Self {
        ServerMessage::Change(event)
    }

    /// Creates a Subscribed message.
    pub fn subscribed(topics: Vec<String>) -> Self {
        ServerMessage::Subscribed { topics }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
