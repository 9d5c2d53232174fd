// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_response_carries_tag_and_message() {
    let response = Response::error(ControlError::AlreadyStarted);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "Error",
            "error": "AlreadyStarted",
            "message": "job is already running",
        })
    );
}

#[test]
fn instance_response_round_trips() {
    let response = Response::Instance {
        name: "tty1".to_string(),
        goal: "start".to_string(),
        state: "running".to_string(),
        processes: vec![ProcessEntry { role: "main".to_string(), pid: 4321 }],
    };

    let json = serde_json::to_string(&response).unwrap();
    let back: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(back, response);
}

#[test]
fn paths_response_round_trips() {
    let response = Response::Paths { paths: vec!["/jobs/web".to_string()] };
    let json = serde_json::to_string(&response).unwrap();
    let back: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(back, response);
}
