// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-document validation tests. Partial or damaged documents are
//! rejected, never patched up.

use super::*;
use crate::class::JobClass;
use crate::engine::Engine;
use crate::env::EnvTable;
use crate::expression::parse::parse_condition;
use crate::job::ProcessRole;
use crate::test_support::FakeProcessOps;
use crate::FakeClock;
use serde_json::{json, Value};

type TestEngine = Engine<FakeProcessOps, FakeClock>;

/// An engine with a running service and a pending event, enough to
/// exercise every record type.
fn populated_engine() -> TestEngine {
    let procs = FakeProcessOps::new();
    let mut engine = Engine::new(procs, FakeClock::new());

    let mut class = JobClass::new("web");
    class.start_on = Some(parse_condition("startup").unwrap());
    class.stop_on = Some(parse_condition("shutdown").unwrap());
    class
        .processes
        .insert(ProcessRole::Main, crate::class::ProcessSpec::Exec(vec!["/bin/sleep".into()]));
    engine.register_class(class);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    engine.emit_event("pending-one", EnvTable::new(), None);
    engine
}

fn doc_json(engine: &mut TestEngine) -> Value {
    serde_json::to_value(engine.serialize_state()).unwrap()
}

fn restore_from(json: Value) -> Result<TestEngine, StateError> {
    let doc: StateDoc = serde_json::from_value(json).map_err(StateError::Json)?;
    Engine::restore(FakeProcessOps::new(), FakeClock::new(), doc)
}

#[test]
fn round_trip_preserves_everything() {
    let mut engine = populated_engine();
    let json = doc_json(&mut engine);

    let restored = restore_from(json).unwrap();

    assert_eq!(restored.queue_len(), engine.queue_len());
    assert_eq!(restored.classes.len(), 1);
    assert_eq!(restored.jobs.len(), 1);

    let (id, job) = restored.jobs.iter().next().unwrap();
    let original = engine.jobs.get(id).unwrap();
    assert_eq!(job, original);
}

#[test]
fn serializing_twice_is_stable() {
    let mut engine = populated_engine();
    let first = doc_json(&mut engine);
    let second = doc_json(&mut engine);
    assert_eq!(first, second);
}

#[test]
fn wrong_version_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["version"] = json!(99);

    assert!(matches!(restore_from(json), Err(StateError::Version(99))));
}

#[test]
fn out_of_range_progress_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["events"][0]["progress"] = json!(3);

    assert!(matches!(
        restore_from(json),
        Err(StateError::InvalidProgress(3))
    ));
}

#[test]
fn unknown_goal_and_state_are_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["classes"][0]["instances"][0]["goal"] = json!("paused");
    assert!(matches!(restore_from(json), Err(StateError::UnknownGoal(_))));

    let mut json = doc_json(&mut engine);
    json["classes"][0]["instances"][0]["state"] = json!("limbo");
    assert!(matches!(restore_from(json), Err(StateError::UnknownState(_))));
}

#[test]
fn unknown_process_role_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["classes"][0]["instances"][0]["pids"] = json!({"sidecar": 42});

    assert!(matches!(restore_from(json), Err(StateError::UnknownRole(_))));
}

#[test]
fn dangling_job_blocker_reference_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["classes"][0]["instances"][0]["blocker"] = json!(404);

    assert!(matches!(
        restore_from(json),
        Err(StateError::DanglingEvent(_))
    ));
}

#[test]
fn dangling_session_reference_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["events"][0]["session"] = json!(404);

    assert!(matches!(
        restore_from(json),
        Err(StateError::DanglingSession(_))
    ));
}

#[test]
fn blocker_count_mismatch_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["events"][0]["blockers"] = json!(7);

    assert!(matches!(
        restore_from(json),
        Err(StateError::BlockerMismatch(_))
    ));
}

#[test]
fn method_links_do_not_round_trip() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["events"][0]["blocking"] = json!([{"type": "method", "ticket": 1, "kind": "emit_event"}]);

    assert!(matches!(restore_from(json), Err(StateError::MethodLink)));
}

#[test]
fn serialize_fails_pending_method_replies_first() {
    let mut engine = populated_engine();
    engine
        .emit_request("wait-for-me", &[], Some(crate::id::Ticket::from_u64(5)), None)
        .unwrap();

    let doc = engine.serialize_state();

    // The reply was completed with an error rather than serialized.
    let replies = engine.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].result, Err(crate::error::ControlError::EventFailed));
    assert!(doc
        .events
        .iter()
        .all(|event| event.blocking.iter().all(|link| !matches!(
            link,
            crate::blocking::Blocked::Method { .. }
        ))));
}

#[test]
fn empty_event_name_is_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    json["events"][0]["name"] = json!("");

    assert!(matches!(restore_from(json), Err(StateError::EmptyEventName)));
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut engine = populated_engine();
    let mut json = doc_json(&mut engine);
    let first = json["events"][0].clone();
    json["events"].as_array_mut().unwrap().push(first);

    assert!(matches!(restore_from(json), Err(StateError::DuplicateId(_))));
}
