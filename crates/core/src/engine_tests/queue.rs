// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event queue tests: three-phase progression, blockers, dispatch order,
//! and failed follow-ons.

use super::*;
use crate::event::Progress;

#[test]
fn unmatched_event_traverses_all_phases_in_one_poll() {
    let (mut engine, _procs, _clock) = engine();
    engine.emit_event("orphan", EnvTable::new(), None);
    assert_eq!(engine.queue_len(), 1);

    engine.poll();

    // Nothing blocked it, so it went pending → handling → finished and
    // was destroyed in a single pass.
    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn blocked_event_stays_handling_until_its_job_arrives() {
    let (mut engine, procs, _clock) = engine();
    // The pre-start script keeps the job in flight across polls.
    let mut class = service_class("web", "trigger");
    class
        .processes
        .insert(ProcessRole::PreStart, exec("/bin/prepare"));
    engine.register_class(class);

    let id = engine.emit_event("trigger", EnvTable::new(), None);
    engine.poll();

    // The job it started holds a blocker; the event survives in handling.
    let event = engine.events.get(&id).unwrap();
    assert_eq!(event.progress, Progress::Handling);
    assert_eq!(event.blockers, 1);

    // Pre-start finishes, the service arrives, the event finishes.
    let pre_start = procs.spawns()[0].pid;
    engine.child_exited(pre_start, 0);
    engine.poll();
    assert!(engine.events.get(&id).is_none());
}

#[test]
fn events_enqueued_mid_poll_are_processed_in_the_same_call() {
    let (mut engine, _procs, _clock) = engine();
    // A task whose lifecycle enqueues four more events while `startup` is
    // being handled.
    engine.register_class(task_class("chore", "startup"));

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    // starting/started were enqueued and fully processed by the same poll.
    assert!(event_names(&engine).contains(&"starting".to_string()));
    assert!(event_names(&engine).contains(&"started".to_string()));
}

#[test]
fn failed_event_queues_failed_follow_on_with_env_copy() {
    let (mut engine, _procs, _clock) = engine();

    let mut env = EnvTable::new();
    env.set("DEVICE", "eth0");
    let id = engine.emit_event("net-up", env, None);
    if let Some(event) = engine.events.get_mut(&id) {
        event.failed = true;
    }

    engine.poll();

    let follow_on = logged_env(&engine, "net-up/failed", 0);
    assert_eq!(follow_on.get("DEVICE"), Some("eth0"));
}

#[test]
fn failed_follow_on_is_not_recursive() {
    let (mut engine, _procs, _clock) = engine();
    let id = engine.emit_event("net-up/failed", EnvTable::new(), None);
    if let Some(event) = engine.events.get_mut(&id) {
        event.failed = true;
    }

    engine.poll();

    assert_eq!(
        event_names(&engine)
            .iter()
            .filter(|n| n.ends_with("/failed"))
            .count(),
        1
    );
    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn two_emits_of_the_same_event_are_two_events() {
    let (mut engine, _procs, _clock) = engine();
    let a = engine.emit_event("tick", EnvTable::new(), None);
    let b = engine.emit_event("tick", EnvTable::new(), None);

    assert_ne!(a, b);
    assert_eq!(engine.queue_len(), 2);
}

#[test]
fn stop_pass_runs_before_start_pass() {
    let (mut engine, procs, _clock) = engine();
    // One event both stops and starts the same service.
    let mut class = service_class("web", "flip");
    class.stop_on = Some(parse_condition("flip").unwrap());
    engine.register_class(class);

    // Bring the instance up first.
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();
    let first_pid = procs.last_pid().unwrap();
    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));

    engine.emit_event("flip", EnvTable::new(), None);
    engine.poll();

    // The stop pass flipped the goal first; the start pass then queued the
    // fresh start, so the job is heading down the stop chain with goal
    // start: a stop, then a start, never the reverse.
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Killed)));
    assert!(procs.kills().iter().any(|(pid, _)| *pid == first_pid));

    engine.child_exited(first_pid, 15 << 8);
    engine.poll();
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    assert_ne!(procs.last_pid().unwrap(), first_pid);
}

#[test]
fn scoped_event_only_dispatches_to_its_session() {
    let (mut engine, _procs, _clock) = engine();
    let session = engine.register_session(crate::session::Session::default());

    engine.register_class(service_class("global", "ping"));
    let mut scoped = service_class("jailed", "ping");
    scoped.session = Some(session);
    engine.register_class(scoped);

    // A scoped ping starts only the scoped class.
    engine.emit_event("ping", EnvTable::new(), Some(session));
    engine.poll();
    assert_eq!(engine.jobs.len(), 1);
    assert_eq!(engine.jobs.values().next().unwrap().class, "jailed");

    // A global ping reaches everything.
    engine.emit_event("ping", EnvTable::new(), None);
    engine.poll();
    assert_eq!(engine.jobs.len(), 2);
}

#[test]
fn stop_env_collects_the_stopping_events() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("web", "go");
    class.stop_on = Some(parse_condition("halt REASON=*").unwrap());
    engine.register_class(class);

    engine.emit_event("go", EnvTable::new(), None);
    engine.poll();
    let id = sole_job(&engine);

    let mut env = EnvTable::new();
    env.set("REASON", "maintenance");
    engine.emit_event("halt", env, None);
    engine.poll();

    let job = engine.jobs.get(&id).unwrap();
    let stop_env = job.stop_env.as_ref().unwrap();
    assert_eq!(stop_env.get("STOKER_STOP_EVENTS"), Some("halt"));
    assert_eq!(stop_env.get("REASON"), Some("maintenance"));
}

#[test]
fn start_env_records_the_triggering_events() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "alpha and beta"));

    engine.emit_event("alpha", EnvTable::new(), None);
    engine.poll();
    assert!(engine.jobs.is_empty());

    engine.emit_event("beta", EnvTable::new(), None);
    engine.poll();

    let spawn = &procs.spawns()[0];
    assert_eq!(spawn.env.get("STOKER_EVENTS"), Some("alpha beta"));
}

#[test]
fn instance_template_multiplexes_jobs() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("getty", "tty-added");
    class.instance = "$TTY".to_string();
    engine.register_class(class);

    let mut env = EnvTable::new();
    env.set("TTY", "tty1");
    engine.emit_event("tty-added", env, None);

    let mut env = EnvTable::new();
    env.set("TTY", "tty2");
    engine.emit_event("tty-added", env, None);

    engine.poll();

    let class = engine.class("getty").unwrap();
    let names: Vec<&String> = class.instances.keys().collect();
    assert_eq!(names, ["tty1", "tty2"]);
}

#[test]
fn unexpandable_instance_template_skips_the_start() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("getty", "tty-added");
    class.instance = "$TTY".to_string();
    engine.register_class(class);

    // No TTY in the event env: the start is dropped with a warning.
    engine.emit_event("tty-added", EnvTable::new(), None);
    engine.poll();

    assert!(engine.jobs.is_empty());
}

#[test]
#[should_panic(expected = "unblock of event")]
fn unblock_without_blockers_is_a_programming_error() {
    let (mut engine, _procs, _clock) = engine();
    let id = engine.emit_event("lonely", EnvTable::new(), None);
    engine.event_unblock(id);
}
