// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end engine scenarios, driven the way the daemon drives the real
//! thing: stimulus, poll, child exits, poll.

use super::*;
use crate::class::{Expect, RespawnPolicy};
use crate::engine::serial::StateDoc;
use crate::event::Progress;

/// A trivial task runs once and the instance disappears.
#[test]
fn trivial_task() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(task_class("chore", "startup"));

    engine.emit_request("startup", &[], None, None).unwrap();
    engine.poll();

    let pid = procs.last_pid().unwrap();
    engine.child_exited(pid, 0);
    engine.poll();

    assert_eq!(
        event_names(&engine),
        ["startup", "starting", "started", "stopping", "stopped"]
    );
    for (name, index) in [("stopping", 0), ("stopped", 0)] {
        let env = logged_env(&engine, name, index);
        assert_eq!(env.get("JOB"), Some("chore"));
        assert_eq!(env.get("INSTANCE"), Some(""));
        assert_eq!(env.get("RESULT"), Some("ok"));
    }

    assert!(engine.jobs.is_empty());
    assert!(engine.class("chore").unwrap().instances.is_empty());
    assert_eq!(engine.queue_len(), 0);
}

/// A main process that cannot spawn fails the job; the failure fans out as
/// `/failed` follow-ons of the stop events.
#[test]
fn spawn_failure() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(task_class("broken", "startup"));
    procs.fail_spawns_of(ProcessRole::Main);

    engine.emit_request("startup", &[], None, None).unwrap();
    engine.poll();

    let names = event_names(&engine);
    assert!(names.contains(&"starting".to_string()));
    assert!(!names.contains(&"started".to_string()));

    for name in ["stopping", "stopped"] {
        let env = logged_env(&engine, name, 0);
        assert_eq!(env.get("RESULT"), Some("failed"));
        assert_eq!(env.get("PROCESS"), Some("main"));
        // Spawn failures carry no exit information.
        assert_eq!(env.get("EXIT_STATUS"), None);
        assert_eq!(env.get("EXIT_SIGNAL"), None);
    }

    assert!(names.contains(&"stopping/failed".to_string()));
    assert!(names.contains(&"stopped/failed".to_string()));
    assert!(engine.jobs.is_empty());
    assert_eq!(engine.queue_len(), 0);
}

/// Starting a job mid pre-stop cancels the stop: the machine re-enters
/// running, the stop reply completes with success, and no stop events are
/// emitted for the cancelled attempt.
#[test]
fn cancelled_stop() {
    let (mut engine, procs, _clock) = engine();
    let mut class = service_class("web", "never");
    class
        .processes
        .insert(ProcessRole::PreStop, exec("/bin/drain"));
    engine.register_class(class);

    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();
    let id = sole_job(&engine);
    let events_after_start = event_names(&engine).len();

    engine
        .stop_job("/jobs/web/_", &[], Some(Ticket::from_u64(1)), None)
        .unwrap();
    assert_eq!(engine.job_state(id), Some((Goal::Stop, State::PreStop)));

    // A start arrives while pre-stop is still running.
    engine.start_job("web", &[], None, None).unwrap();
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::PreStop)));

    // The pending stop reply completed with success, not failure.
    let replies = engine.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].result, Ok(ReplyBody::Done));

    // Pre-stop finishes; the machine returns to running with the stop
    // environment dropped and no stopping/stopped events emitted.
    let pre_stop = procs.spawns().last().unwrap().pid;
    engine.child_exited(pre_stop, 0);
    engine.poll();

    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    assert!(engine.jobs.get(&id).unwrap().stop_env.is_none());
    let names = event_names(&engine)[events_after_start..].to_vec();
    assert!(!names.contains(&"stopping".to_string()));
    assert!(!names.contains(&"stopped".to_string()));
}

/// `emit(…, wait)` does not reply until everything the event started has
/// arrived.
#[test]
fn blocking_round_trip() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("slow", "e");
    class.expect = Expect::Daemon;
    engine.register_class(class);

    engine
        .emit_request("e", &[], Some(Ticket::from_u64(9)), None)
        .unwrap();
    engine.poll();

    // The job is parked in spawned; the event is still handling and the
    // reply has not been sent.
    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Spawned)));
    assert!(engine.take_replies().is_empty());
    assert!(engine
        .events
        .values()
        .any(|e| e.name == "e" && e.progress == Progress::Handling && e.blockers > 0));

    // The daemon reports itself ready; the job runs, the event finishes,
    // the reply goes out.
    engine.expect_met(id);
    engine.poll();

    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    let replies = engine.take_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].ticket, Ticket::from_u64(9));
    assert_eq!(replies[0].result, Ok(ReplyBody::Done));
}

/// Respawning faster than the limit allows stops the job with a respawn
/// failure.
#[test]
fn respawn_storm() {
    let (mut engine, procs, _clock) = engine();
    let mut class = service_class("flappy", "startup");
    class.respawn = true;
    class.respawn_limit = RespawnPolicy { count: 3, interval_secs: 5 };
    engine.register_class(class);

    engine.emit_request("startup", &[], None, None).unwrap();
    engine.poll();

    // Three respawns are tolerated…
    for attempt in 0..3 {
        let pid = procs.last_pid().unwrap();
        engine.child_exited(pid, 1);
        engine.poll();
        let id = sole_job(&engine);
        assert_eq!(
            engine.job_state(id),
            Some((Goal::Start, State::Running)),
            "respawn attempt {attempt}"
        );
    }

    // …the fourth trips the limit.
    let pid = procs.last_pid().unwrap();
    engine.child_exited(pid, 1);
    engine.poll();

    assert!(engine.jobs.is_empty());
    let last_stopping = event_names(&engine)
        .iter()
        .filter(|n| *n == "stopping")
        .count()
        - 1;
    let env = logged_env(&engine, "stopping", last_stopping);
    assert_eq!(env.get("RESULT"), Some("failed"));
    assert_eq!(env.get("PROCESS"), Some("respawn"));
}

/// Serialize a mid-flight engine, restore it, and let the restored one run
/// the trivial-task sequence to completion.
#[test]
fn reexec_round_trip() {
    let (mut engine, procs, clock) = engine();
    engine.register_class(task_class("chore", "startup"));
    engine.register_class(service_class("web", "never"));

    // One running instance and two pending events.
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();
    engine.emit_event("startup", EnvTable::new(), None);
    engine.emit_event("spare", EnvTable::new(), None);

    let doc = engine.serialize_state();
    let json = serde_json::to_string(&doc).unwrap();
    let doc: StateDoc = serde_json::from_str(&json).unwrap();

    let mut restored = crate::engine::Engine::restore(procs.clone(), clock, doc).unwrap();

    // Equivalence: same queue, same classes, same instance state.
    assert_eq!(restored.queue_len(), 2);
    assert!(restored.class("chore").unwrap().task);
    let id = sole_job(&restored);
    assert_eq!(restored.job_state(id), Some((Goal::Start, State::Running)));
    assert_eq!(
        restored.jobs.get(&id).unwrap().pids.get(ProcessRole::Main),
        engine.jobs.get(&id).unwrap().pids.get(ProcessRole::Main),
    );

    // The pending startup drives the task through its whole sequence.
    restored.poll();
    let task_pid = procs.last_pid().unwrap();
    restored.child_exited(task_pid, 0);
    restored.poll();

    // The restored log starts after the hand-off, so it holds exactly the
    // task's own lifecycle.
    let names = event_names(&restored);
    assert_eq!(names, ["starting", "started", "stopping", "stopped"]);
    assert!(restored.class("chore").unwrap().instances.is_empty());
}
