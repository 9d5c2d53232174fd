// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job specs: tasks driven by events, services driven by start/stop.

use crate::prelude::*;
use serial_test::serial;

const CHORE: &str = r#"
task = true
start-on = "startup"

[process.main]
exec = ["/bin/true"]
"#;

const WEB: &str = r#"
[process.main]
exec = ["/bin/sleep", "30"]
"#;

#[test]
#[serial]
fn emitted_event_runs_a_task_to_completion() {
    let daemon = Daemon::start(&[("chore", CHORE)]);

    // `emit` waits for the event to finish, which in turn waits for the
    // task it started.
    daemon.stoker(&["emit", "startup"]).assert().success();

    let output = daemon.stoker(&["list"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chore stop/waiting"), "got: {stdout}");
}

#[test]
#[serial]
fn service_round_trip() {
    let daemon = Daemon::start(&[("web", WEB)]);

    let output = daemon.stoker(&["start", "web"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "/jobs/web/_");

    let output = daemon.stoker(&["status", "web"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("web start/running, process "), "got: {stdout}");

    // Starting again reports the obvious.
    let output = daemon.stoker(&["start", "web"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("AlreadyStarted"));

    daemon.stoker(&["stop", "web"]).assert().success();

    // The sole instance is gone once the stop chain runs down.
    let output = daemon.stoker(&["status", "web"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("UnknownInstance"));

    let output = daemon.stoker(&["list"]).output().unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains("web stop/waiting"));
}

#[test]
#[serial]
fn restart_replaces_the_main_process() {
    let daemon = Daemon::start(&[("web", WEB)]);

    daemon.stoker(&["start", "web"]).assert().success();
    let first = main_pid(&daemon);

    daemon.stoker(&["restart", "web"]).assert().success();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        let pid = main_pid(&daemon);
        pid != 0 && pid != first
    }));

    daemon.stoker(&["stop", "web"]).assert().success();
}

fn main_pid(daemon: &Daemon) -> u32 {
    let output = daemon.stoker(&["status", "web"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .rsplit("process ")
        .next()
        .and_then(|tail| tail.trim().parse().ok())
        .unwrap_or(0)
}
