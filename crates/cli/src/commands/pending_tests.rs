// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::update_item;
use serde_json::json;

#[test]
fn test_format_item_shows_operation_table_and_payload() {
    let item = update_item("members", json!({"id": 7}));

    let line = format_item(&item);

    assert!(line.starts_with(item.id.as_str()));
    assert!(line.contains("UPDATE members"));
    assert!(line.ends_with(r#"{"id":7}"#));
}
