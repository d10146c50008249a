// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fk-core: Shared data model for the flock sync engine
//!
//! This crate provides the pending-mutation type, change feed events and the
//! wire protocol used by both the `flock` engine and the `fk-remote` server.

pub mod change;
pub mod error;
pub mod item;
pub mod protocol;

pub use change::{ChangeEvent, ChangeKind};
pub use error::{Error, Result};
pub use item::{Operation, SyncItem, SyncItemId, RECORD_ID_KEY};
pub use protocol::{ClientMessage, Filter, ServerMessage};
