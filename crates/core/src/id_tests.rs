// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn handle_display() {
    let id = EventId::from_u64(42);
    assert_eq!(id.to_string(), "42");
}

#[test]
fn handle_equality() {
    let id1 = JobId::from_u64(1);
    let id2 = JobId::from_u64(1);
    let id3 = JobId::from_u64(2);

    assert_eq!(id1, id2);
    assert_ne!(id1, id3);
}

#[test]
fn handle_serde_is_transparent() {
    let id = EventId::from_u64(7);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "7");

    let parsed: EventId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn handle_ordering_follows_issue_order() {
    assert!(EventId::from_u64(1) < EventId::from_u64(2));
}
