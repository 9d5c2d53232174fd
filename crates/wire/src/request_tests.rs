// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn start_serializes_with_type_tag() {
    let request = Request::Start {
        name: "web".to_string(),
        env: vec!["PORT=80".to_string()],
        wait: true,
        session: None,
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "type": "Start",
            "name": "web",
            "env": ["PORT=80"],
            "wait": true,
            "session": null,
        })
    );
}

#[test]
fn env_wait_and_session_are_optional_on_the_wire() {
    let request: Request =
        serde_json::from_str(r#"{"type": "EmitEvent", "name": "startup"}"#).unwrap();
    assert_eq!(
        request,
        Request::EmitEvent {
            name: "startup".to_string(),
            env: vec![],
            wait: false,
            session: None,
        }
    );
}

#[test]
fn session_handles_ride_along() {
    let request: Request =
        serde_json::from_str(r#"{"type": "GetAllJobs", "session": 3}"#).unwrap();
    assert_eq!(
        request,
        Request::GetAllJobs { session: Some(SessionId::from_u64(3)) }
    );
}

#[parameterized(
    ping = { Request::Ping },
    version = { Request::Version },
    get_all_jobs = { Request::GetAllJobs { session: None } },
    get_job = { Request::GetJobByName { name: "web".to_string(), session: None } },
    get_instances = { Request::GetAllInstances {
        path: "/jobs/web".to_string(),
        session: Some(SessionId::from_u64(1)),
    } },
    get_instance = { Request::GetInstance { path: "/jobs/web/_".to_string(), session: None } },
    reload = { Request::Reload },
    shutdown = { Request::Shutdown },
)]
fn round_trips(request: Request) {
    let json = serde_json::to_string(&request).unwrap();
    let back: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(back, request);
}

#[test]
fn unknown_request_type_is_rejected() {
    let result = serde_json::from_str::<Request>(r#"{"type": "Reboot"}"#);
    assert!(result.is_err());
}
