// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::class::{JobClass, ProcessSpec};
use crate::engine::{class_path, instance_path, Engine, Outcome, ReplyBody};
use crate::env::EnvTable;
use crate::error::ControlError;
use crate::expression::parse::parse_condition;
use crate::id::{JobId, Ticket};
use crate::job::{Goal, ProcessRole, State};
use crate::session::Session;
use crate::test_support::FakeProcessOps;
use crate::FakeClock;

mod machine;
mod queue;
mod scenarios;

pub(crate) type TestEngine = Engine<FakeProcessOps, FakeClock>;

pub(crate) fn engine() -> (TestEngine, FakeProcessOps, FakeClock) {
    let procs = FakeProcessOps::new();
    let clock = FakeClock::new();
    let engine = Engine::new(procs.clone(), clock.clone());
    (engine, procs, clock)
}

pub(crate) fn exec(path: &str) -> ProcessSpec {
    ProcessSpec::Exec(vec![path.to_string()])
}

/// A one-shot task started by `start_on`.
pub(crate) fn task_class(name: &str, start_on: &str) -> JobClass {
    let mut class = JobClass::new(name);
    class.task = true;
    class.start_on = Some(parse_condition(start_on).unwrap());
    class.processes.insert(ProcessRole::Main, exec("/bin/true"));
    class
}

/// A long-running service started by `start_on`.
pub(crate) fn service_class(name: &str, start_on: &str) -> JobClass {
    let mut class = JobClass::new(name);
    class.start_on = Some(parse_condition(start_on).unwrap());
    class.processes.insert(ProcessRole::Main, exec("/bin/sleep"));
    class
}

pub(crate) fn event_names(engine: &TestEngine) -> Vec<String> {
    engine.event_log.iter().map(|(name, _)| name.to_string()).collect()
}

/// Env of the `index`th occurrence of `name` in the event log.
pub(crate) fn logged_env(engine: &TestEngine, name: &str, index: usize) -> EnvTable {
    engine
        .event_log
        .iter()
        .filter(|(n, _)| n == name)
        .nth(index)
        .map(|(_, env)| env.clone())
        .unwrap_or_else(|| panic!("no {name} event #{index} in {:?}", event_names(engine)))
}

pub(crate) fn sole_job(engine: &TestEngine) -> JobId {
    assert_eq!(engine.jobs.len(), 1, "expected exactly one job");
    *engine.jobs.keys().next().unwrap()
}

// ---- registry ----

#[test]
fn register_and_look_up_class() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(JobClass::new("mysql"));

    assert!(engine.class("mysql").is_some());
    assert_eq!(engine.class_names().collect::<Vec<_>>(), ["mysql"]);
}

#[test]
fn remove_class_without_instances_drops_it() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(JobClass::new("mysql"));
    engine.remove_class("mysql");

    assert!(engine.class("mysql").is_none());
}

#[test]
fn remove_class_with_instances_leaves_tombstone() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    assert_eq!(engine.jobs.len(), 1);

    engine.remove_class("web");
    let class = engine.class("web").unwrap();
    assert!(class.deleted);

    // Starting the tombstone is refused.
    assert_eq!(
        engine.start_job("web", &[], None, None),
        Err(ControlError::UnknownJob)
    );
}

#[test]
fn tombstone_class_destroyed_with_last_instance() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    engine.remove_class("web");

    // Stop the instance and let the machine run down.
    let id = sole_job(&engine);
    engine.change_goal(id, Goal::Stop);
    engine.poll();
    let pid = procs.last_pid().unwrap();
    engine.child_exited(pid, 15 << 8);
    engine.poll();

    assert!(engine.class("web").is_none());
    assert!(engine.jobs.is_empty());
}

#[test]
fn replacing_a_class_keeps_its_instances() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    let mut updated = service_class("web", "never");
    updated.respawn = true;
    engine.register_class(updated);

    assert_eq!(engine.class("web").unwrap().instances.len(), 1);
    assert!(engine.class("web").unwrap().respawn);
}

// ---- control operations ----

#[test]
fn start_unknown_class_is_an_error() {
    let (mut engine, _procs, _clock) = engine();
    assert_eq!(
        engine.start_job("ghost", &[], None, None),
        Err(ControlError::UnknownJob)
    );
}

#[test]
fn start_replies_with_instance_path() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));

    let outcome = engine.start_job("web", &[], None, None).unwrap();
    assert_eq!(
        outcome,
        Outcome::Replied(ReplyBody::Path("/jobs/web/_".to_string()))
    );
    assert_eq!(engine.job_state(sole_job(&engine)), Some((Goal::Start, State::Starting)));
}

#[test]
fn start_twice_is_already_started() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.start_job("web", &[], None, None).unwrap();

    assert_eq!(
        engine.start_job("web", &[], None, None),
        Err(ControlError::AlreadyStarted)
    );
}

#[test]
fn start_with_wait_defers_until_running() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));

    let outcome = engine
        .start_job("web", &[], Some(Ticket::from_u64(7)), None)
        .unwrap();
    assert_eq!(outcome, Outcome::Deferred);
    assert!(engine.take_replies().is_empty());

    engine.poll();

    let replies = engine.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].ticket, Ticket::from_u64(7));
    assert_eq!(
        replies[0].result,
        Ok(ReplyBody::Path("/jobs/web/_".to_string()))
    );
}

#[test]
fn start_request_env_overrides_class_env() {
    let (mut engine, procs, _clock) = engine();
    let mut class = service_class("web", "never");
    class.env.set("PORT", "80");
    engine.register_class(class);

    engine
        .start_job("web", &["PORT=8080".to_string()], None, None)
        .unwrap();
    engine.poll();

    let spawn = &procs.spawns()[0];
    assert_eq!(spawn.env.get("PORT"), Some("8080"));
}

#[test]
fn stop_on_waiting_instance_is_already_stopped() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();

    // Stop it once…
    engine.stop_job("/jobs/web/_", &[], None, None).unwrap();
    // …and the second stop finds the goal already at stop.
    assert_eq!(
        engine.stop_job("/jobs/web/_", &[], None, None),
        Err(ControlError::AlreadyStopped)
    );
}

#[test]
fn stop_unknown_instance_is_an_error() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));

    assert_eq!(
        engine.stop_job("/jobs/web/missing", &[], None, None),
        Err(ControlError::UnknownInstance)
    );
    assert_eq!(
        engine.stop_job("/jobs/ghost/_", &[], None, None),
        Err(ControlError::UnknownJob)
    );
}

#[test]
fn restart_runs_the_stop_chain_then_starts_again() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();
    let first_pid = procs.last_pid().unwrap();

    let outcome = engine.restart_job("/jobs/web/_", &[], None, None).unwrap();
    assert_eq!(
        outcome,
        Outcome::Replied(ReplyBody::Path("/jobs/web/_".to_string()))
    );

    engine.poll();
    // TERM went out to the old main process…
    assert!(procs.kills().iter().any(|(pid, _)| *pid == first_pid));

    engine.child_exited(first_pid, 15 << 8);
    engine.poll();

    // …and a new one is up.
    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    assert_ne!(procs.last_pid().unwrap(), first_pid);
}

#[test]
fn emit_with_empty_name_is_invalid() {
    let (mut engine, _procs, _clock) = engine();
    assert_eq!(
        engine.emit_request("", &[], None, None),
        Err(ControlError::InvalidArgument)
    );
}

#[test]
fn session_scoping_denies_cross_session_requests() {
    let (mut engine, _procs, _clock) = engine();
    let session = engine.register_session(Session::default());

    let mut class = service_class("jailed", "never");
    class.session = Some(session);
    engine.register_class(class);

    assert_eq!(
        engine.start_job("jailed", &[], None, None),
        Err(ControlError::PermissionDenied)
    );
    assert!(engine.start_job("jailed", &[], None, Some(session)).is_ok());
}

// ---- queries ----

#[test]
fn queries_list_classes_and_instances() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.register_class(service_class("db", "never"));
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();

    assert_eq!(engine.all_jobs(None), ["/jobs/web", "/jobs/db"]);
    assert_eq!(engine.job_by_name("web", None).unwrap(), "/jobs/web");
    assert_eq!(
        engine.job_by_name("ghost", None),
        Err(ControlError::UnknownJob)
    );
    assert_eq!(
        engine.all_instances("/jobs/web", None).unwrap(),
        ["/jobs/web/_"]
    );
    assert_eq!(
        engine.instance_by_name("/jobs/web", "", None).unwrap(),
        "/jobs/web/_"
    );

    let info = engine.instance_info("/jobs/web/_", None).unwrap();
    assert_eq!(info.name, "");
    assert_eq!(info.goal, "start");
    assert_eq!(info.state, "running");
    assert_eq!(info.processes.len(), 1);
    assert_eq!(info.processes[0].0, "main");
}

#[test]
fn paths_round_trip() {
    assert_eq!(class_path("web"), "/jobs/web");
    assert_eq!(instance_path("web", ""), "/jobs/web/_");
    assert_eq!(instance_path("getty", "tty1"), "/jobs/getty/tty1");
}
