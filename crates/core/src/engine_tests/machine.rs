// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State machine unit tests: the transition table, entry actions, failure
//! handling, and kill escalation.

use super::*;
use crate::clock::Clock;
use crate::engine::machine::next_state;
use crate::process::KillSignal;
use proptest::prelude::*;
use std::time::Duration;
use yare::parameterized;

#[parameterized(
    waiting_start = { State::Waiting, Goal::Start, false, State::Starting },
    starting_start = { State::Starting, Goal::Start, false, State::PreStart },
    starting_stop = { State::Starting, Goal::Stop, false, State::Stopping },
    pre_start_start = { State::PreStart, Goal::Start, false, State::Spawned },
    pre_start_stop = { State::PreStart, Goal::Stop, false, State::Stopping },
    spawned_start = { State::Spawned, Goal::Start, false, State::PostStart },
    spawned_stop = { State::Spawned, Goal::Stop, false, State::Stopping },
    post_start_start = { State::PostStart, Goal::Start, false, State::Running },
    post_start_stop = { State::PostStart, Goal::Stop, false, State::Stopping },
    running_start = { State::Running, Goal::Start, false, State::Stopping },
    running_stop_main_alive = { State::Running, Goal::Stop, true, State::PreStop },
    running_stop_main_dead = { State::Running, Goal::Stop, false, State::Stopping },
    pre_stop_start = { State::PreStop, Goal::Start, false, State::Running },
    pre_stop_stop = { State::PreStop, Goal::Stop, false, State::Stopping },
    stopping_start = { State::Stopping, Goal::Start, false, State::Killed },
    stopping_stop = { State::Stopping, Goal::Stop, false, State::Killed },
    killed_start = { State::Killed, Goal::Start, false, State::PostStop },
    killed_stop = { State::Killed, Goal::Stop, false, State::PostStop },
    post_stop_start = { State::PostStop, Goal::Start, false, State::Starting },
    post_stop_stop = { State::PostStop, Goal::Stop, false, State::Waiting },
)]
fn transition_table(state: State, goal: Goal, main_alive: bool, expected: State) {
    assert_eq!(next_state(state, goal, main_alive), expected);
}

#[test]
#[should_panic(expected = "waiting job asked for the next state towards stop")]
fn waiting_towards_stop_is_a_programming_error() {
    next_state(State::Waiting, Goal::Stop, false);
}

proptest! {
    /// `next_state` is a pure function of its inputs.
    #[test]
    fn next_state_is_pure(state_idx in 1usize..10, goal_idx in 0usize..2, main_alive: bool) {
        let states = [
            State::Starting, State::PreStart, State::Spawned, State::PostStart,
            State::Running, State::PreStop, State::Stopping, State::Killed,
            State::PostStop,
        ];
        let goals = [Goal::Stop, Goal::Start];
        let state = states[state_idx - 1];
        let goal = goals[goal_idx];

        prop_assert_eq!(
            next_state(state, goal, main_alive),
            next_state(state, goal, main_alive)
        );
    }
}

#[test]
fn change_goal_is_idempotent() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();

    let id = sole_job(&engine);
    let before = event_names(&engine).len();

    // A second change to the same goal has the effect of one call.
    engine.change_goal(id, Goal::Start);
    assert_eq!(event_names(&engine).len(), before);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
}

#[test]
fn job_failed_keeps_the_first_record() {
    let (mut engine, _procs, _clock) = engine();
    engine.register_class(service_class("web", "never"));
    engine.start_job("web", &[], None, None).unwrap();
    engine.poll();

    let id = sole_job(&engine);
    engine.job_failed(id, Some(ProcessRole::Main), 9 << 8);
    engine.job_failed(id, Some(ProcessRole::PostStop), 1);

    let job = engine.jobs.get(&id).unwrap();
    let failure = job.failure.unwrap();
    assert_eq!(failure.process, Some(ProcessRole::Main));
    assert_eq!(failure.status, 9 << 8);
}

#[test]
fn job_without_main_runs_without_spawning() {
    let (mut engine, procs, _clock) = engine();
    let mut class = JobClass::new("stub");
    class.start_on = Some(parse_condition("startup").unwrap());
    engine.register_class(class);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    // Spawned and PostStart pass straight through to Running.
    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    assert!(procs.spawns().is_empty());
}

#[test]
fn pre_start_failure_turns_the_job_around() {
    let (mut engine, procs, _clock) = engine();
    let mut class = task_class("doomed", "startup");
    class.processes.insert(ProcessRole::PreStart, exec("/no/such"));
    engine.register_class(class);
    procs.fail_spawns_of(ProcessRole::PreStart);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    // Main never ran; the stop events record the pre-start failure.
    assert!(!procs.spawned_roles().contains(&ProcessRole::Main));
    let env = logged_env(&engine, "stopped", 0);
    assert_eq!(env.get("RESULT"), Some("failed"));
    assert_eq!(env.get("PROCESS"), Some("pre-start"));
    assert_eq!(env.get("EXIT_STATUS"), None);
    assert!(engine.jobs.is_empty());
}

#[test]
fn post_start_failure_is_not_fatal() {
    let (mut engine, procs, _clock) = engine();
    let mut class = service_class("web", "startup");
    class.processes.insert(ProcessRole::PostStart, exec("/no/such"));
    engine.register_class(class);
    procs.fail_spawns_of(ProcessRole::PostStart);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
    assert!(!engine.jobs.get(&id).unwrap().failed());
}

#[test]
fn stopping_a_job_with_no_live_main_skips_killed() {
    let (mut engine, procs, _clock) = engine();
    let mut class = JobClass::new("stub");
    class.start_on = Some(parse_condition("startup").unwrap());
    engine.register_class(class);
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    let id = sole_job(&engine);
    engine.change_goal(id, Goal::Stop);
    engine.poll();

    // No process existed, so nothing was signalled and the job is gone.
    assert!(procs.kills().is_empty());
    assert!(engine.jobs.is_empty());
    let names = event_names(&engine);
    assert!(names.contains(&"stopped".to_string()));
}

#[test]
fn kill_timer_escalates_term_to_kill() {
    let (mut engine, procs, clock) = engine();
    let mut class = service_class("stuck", "startup");
    class.kill_timeout_secs = 5;
    engine.register_class(class);
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    let pid = procs.last_pid().unwrap();

    let id = sole_job(&engine);
    engine.change_goal(id, Goal::Stop);
    engine.poll();

    assert_eq!(procs.kills(), [(pid, KillSignal::Term)]);
    let due = engine.next_deadline().unwrap();
    assert_eq!(due, clock.epoch_ms() + 5_000);

    // Before the deadline nothing more happens.
    engine.tick();
    assert_eq!(procs.kills().len(), 1);

    clock.advance(Duration::from_secs(6));
    engine.tick();
    assert_eq!(procs.kills(), [(pid, KillSignal::Term), (pid, KillSignal::Kill)]);
    assert_eq!(engine.next_deadline(), None);
}

#[test]
fn main_exit_cancels_the_kill_timer() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    let pid = procs.last_pid().unwrap();

    let id = sole_job(&engine);
    engine.change_goal(id, Goal::Stop);
    engine.poll();
    assert!(engine.next_deadline().is_some());

    engine.child_exited(pid, 15 << 8);
    assert_eq!(engine.next_deadline(), None);
}

#[test]
fn expect_fork_parks_in_spawned_until_reported() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("daemonish", "startup");
    class.expect = crate::class::Expect::Fork;
    engine.register_class(class);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    let id = sole_job(&engine);
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Spawned)));

    engine.expect_met(id);
    engine.poll();
    assert_eq!(engine.job_state(id), Some((Goal::Start, State::Running)));
}

#[test]
fn started_event_carries_exported_variables() {
    let (mut engine, _procs, _clock) = engine();
    let mut class = service_class("net", "startup");
    class.env.set("IFACE", "eth0");
    class.export = vec!["IFACE".to_string()];
    engine.register_class(class);

    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();

    let env = logged_env(&engine, "started", 0);
    assert_eq!(env.get("JOB"), Some("net"));
    assert_eq!(env.get("INSTANCE"), Some(""));
    assert_eq!(env.get("IFACE"), Some("eth0"));
}

#[test]
fn stop_event_reports_exit_signal_by_name() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    let pid = procs.last_pid().unwrap();

    // Killed by SIGSEGV, out of the blue.
    engine.child_exited(pid, 11 << 8);
    engine.poll();

    let env = logged_env(&engine, "stopping", 0);
    assert_eq!(env.get("RESULT"), Some("failed"));
    assert_eq!(env.get("PROCESS"), Some("main"));
    assert_eq!(env.get("EXIT_SIGNAL"), Some("SEGV"));
    assert_eq!(env.get("EXIT_STATUS"), None);
}

#[test]
fn stop_event_reports_exit_status_for_plain_exits() {
    let (mut engine, procs, _clock) = engine();
    engine.register_class(service_class("web", "startup"));
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    let pid = procs.last_pid().unwrap();

    engine.child_exited(pid, 3);
    engine.poll();

    let env = logged_env(&engine, "stopping", 0);
    assert_eq!(env.get("RESULT"), Some("failed"));
    assert_eq!(env.get("EXIT_STATUS"), Some("3"));
    assert_eq!(env.get("EXIT_SIGNAL"), None);
}

#[test]
fn listed_normal_exit_is_not_a_failure() {
    let (mut engine, procs, _clock) = engine();
    let mut class = service_class("web", "startup");
    class.normal_exit = vec![3];
    engine.register_class(class);
    engine.emit_event("startup", EnvTable::new(), None);
    engine.poll();
    let pid = procs.last_pid().unwrap();

    engine.child_exited(pid, 3);
    engine.poll();

    let env = logged_env(&engine, "stopped", 0);
    assert_eq!(env.get("RESULT"), Some("ok"));
    assert!(engine.jobs.is_empty());
}
