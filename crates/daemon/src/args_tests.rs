// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

fn parse(argv: &[&str]) -> Args {
    let mut full = vec!["stokerd"];
    full.extend_from_slice(argv);
    Args::parse_from(full)
}

#[test]
fn defaults() {
    let args = parse(&[]);
    assert!(args.confdir.is_none());
    assert!(!args.restart);
    assert_eq!(args.startup_event(), Some("startup"));
}

#[test]
fn startup_event_override() {
    let args = parse(&["--startup-event", "boot"]);
    assert_eq!(args.startup_event(), Some("boot"));
}

#[test]
fn no_startup_event_wins() {
    let args = parse(&["--no-startup-event", "--startup-event", "boot"]);
    assert_eq!(args.startup_event(), None);
}

#[test]
fn restart_suppresses_the_startup_event() {
    let args = parse(&["--restart", "--state-fd", "7"]);
    assert_eq!(args.startup_event(), None);
    assert_eq!(args.state_fd, Some(7));
}

#[test]
fn reexec_args_round_trip_the_sticky_flags() {
    let args = parse(&[
        "--confdir", "/etc/stoker",
        "--logdir", "/var/log/stoker",
        "--no-log",
        "--no-sessions",
    ]);

    let replay = args.reexec_args();
    assert_eq!(
        replay,
        [
            "--confdir",
            "/etc/stoker",
            "--logdir",
            "/var/log/stoker",
            "--no-log",
            "--no-sessions",
        ]
    );

    // The replayed flags must themselves parse.
    let mut argv = vec!["stokerd".to_string()];
    argv.extend(replay);
    argv.extend(["--restart".to_string(), "--state-fd".to_string(), "3".to_string()]);
    let reparsed = Args::try_parse_from(argv).unwrap();
    assert!(reparsed.restart);
}
