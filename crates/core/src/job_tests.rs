// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn new_job_rests_in_waiting() {
    let job = Job::new("mysql", "", None, None);

    assert_eq!(job.goal, Goal::Stop);
    assert_eq!(job.state, State::Waiting);
    assert!(job.blocker.is_none());
    assert!(job.blocking.is_empty());
    assert!(!job.failed());
}

#[parameterized(
    stop = { Goal::Stop, "stop" },
    start = { Goal::Start, "start" },
    respawn = { Goal::Respawn, "respawn" },
)]
fn goal_names_round_trip(goal: Goal, name: &str) {
    assert_eq!(goal.to_string(), name);
    assert_eq!(Goal::from_name(name), Some(goal));
}

#[parameterized(
    waiting = { State::Waiting, "waiting" },
    starting = { State::Starting, "starting" },
    pre_start = { State::PreStart, "pre-start" },
    spawned = { State::Spawned, "spawned" },
    post_start = { State::PostStart, "post-start" },
    running = { State::Running, "running" },
    pre_stop = { State::PreStop, "pre-stop" },
    stopping = { State::Stopping, "stopping" },
    killed = { State::Killed, "killed" },
    post_stop = { State::PostStop, "post-stop" },
)]
fn state_names_round_trip(state: State, name: &str) {
    assert_eq!(state.to_string(), name);
    assert_eq!(State::from_name(name), Some(state));
}

#[test]
fn unknown_names_do_not_parse() {
    assert_eq!(Goal::from_name("paused"), None);
    assert_eq!(State::from_name("limbo"), None);
    assert_eq!(ProcessRole::from_name("sidecar"), None);
}

#[test]
fn process_table_tracks_roles() {
    let mut pids = ProcessTable::default();
    assert_eq!(pids.get(ProcessRole::Main), None);

    pids.set(ProcessRole::Main, 100);
    pids.set(ProcessRole::PostStart, 101);

    assert_eq!(pids.get(ProcessRole::Main), Some(100));
    assert_eq!(pids.role_of(101), Some(ProcessRole::PostStart));
    assert_eq!(pids.role_of(999), None);
    assert_eq!(
        pids.live(),
        [(ProcessRole::Main, 100), (ProcessRole::PostStart, 101)]
    );

    pids.clear(ProcessRole::Main);
    assert_eq!(pids.get(ProcessRole::Main), None);
}

#[test]
fn respawn_limit_counts_within_window() {
    let mut job = Job::new("flaky", "", None, None);

    // limit 3 within 5 seconds: the fourth attempt trips it.
    assert!(!job.respawn_exceeds_limit(100, 3, 5));
    assert!(!job.respawn_exceeds_limit(101, 3, 5));
    assert!(!job.respawn_exceeds_limit(102, 3, 5));
    assert!(job.respawn_exceeds_limit(103, 3, 5));
}

#[test]
fn respawn_window_resets_after_interval() {
    let mut job = Job::new("flaky", "", None, None);

    assert!(!job.respawn_exceeds_limit(100, 2, 5));
    assert!(!job.respawn_exceeds_limit(101, 2, 5));

    // Window expired: counting starts over.
    assert!(!job.respawn_exceeds_limit(106, 2, 5));
    assert_eq!(job.respawn_count, 1);
}
