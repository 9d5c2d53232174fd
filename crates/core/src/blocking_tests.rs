// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn serializes_with_type_tag() {
    let link = Blocked::Job { job: JobId::from_u64(3) };
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(json, serde_json::json!({"type": "job", "job": 3}));

    let link = Blocked::Event { event: EventId::from_u64(9) };
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(json, serde_json::json!({"type": "event", "event": 9}));

    let link = Blocked::Method { ticket: Ticket::from_u64(1), kind: MethodKind::EmitEvent };
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"type": "method", "ticket": 1, "kind": "emit_event"})
    );
}

#[test]
fn unknown_type_tag_fails_deserialization() {
    let raw = serde_json::json!({"type": "subscription", "peer": 1});
    assert!(serde_json::from_value::<Blocked>(raw).is_err());
}
