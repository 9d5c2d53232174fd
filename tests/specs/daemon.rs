// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs: startup, version, errors, shutdown.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn daemon_answers_version() {
    let daemon = Daemon::start(&[]);

    let output = daemon.stoker(&["version"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("stokerd "), "got: {stdout}");
}

#[test]
#[serial]
fn starting_an_unknown_job_fails_with_the_error_tag() {
    let daemon = Daemon::start(&[]);

    let output = daemon.stoker(&["start", "ghost"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("UnknownJob"), "got: {stderr}");
}

#[test]
#[serial]
fn emitting_an_unmatched_event_succeeds() {
    let daemon = Daemon::start(&[]);

    daemon.stoker(&["emit", "nothing-listens"]).assert().success();
}

#[test]
#[serial]
fn shutdown_stops_the_daemon() {
    let daemon = Daemon::start(&[]);

    daemon.stoker(&["shutdown"]).assert().success();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        daemon
            .stoker(&["version"])
            .output()
            .map(|o| !o.status.success())
            .unwrap_or(true)
    }));
}
