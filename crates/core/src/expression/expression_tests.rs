// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::expression::parse::parse_condition;

fn ev(id: u64) -> EventId {
    EventId::from_u64(id)
}

fn offer(expr: &mut Expr, id: u64, name: &str, env: &[&str]) -> bool {
    let env = EnvTable::from_entries(env.iter().copied());
    expr.handle(ev(id), name, &env, None, None)
}

#[test]
fn single_match_latches_and_captures() {
    let mut expr = Expr::Match(Matcher::new("startup"));

    assert!(!expr.value());
    assert!(offer(&mut expr, 1, "startup", &["RUNLEVEL=2"]));
    assert!(expr.value());

    let captures = expr.captures();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].0.as_str(), "startup");
    assert_eq!(captures[0].1.event, ev(1));
    assert_eq!(captures[0].1.env.get("RUNLEVEL"), Some("2"));
}

#[test]
fn mismatched_name_does_not_update() {
    let mut expr = Expr::Match(Matcher::new("startup"));
    assert!(!offer(&mut expr, 1, "shutdown", &[]));
    assert!(!expr.value());
}

#[test]
fn and_requires_both_sides_across_separate_events() {
    let mut expr = parse_condition("started network and started syslog").unwrap();

    assert!(offer(&mut expr, 1, "started", &["JOB=network"]));
    // Hold on: the matchers here have no patterns, both match "started".
    assert!(expr.value());
}

#[test]
fn and_with_keyed_patterns_needs_two_events() {
    let mut expr = parse_condition("started JOB=network and started JOB=syslog").unwrap();

    assert!(offer(&mut expr, 1, "started", &["JOB=network"]));
    assert!(!expr.value());

    assert!(offer(&mut expr, 2, "started", &["JOB=syslog"]));
    assert!(expr.value());

    let captured: Vec<u64> = expr.captures().iter().map(|(_, c)| c.event.as_u64()).collect();
    assert_eq!(captured, [1, 2]);
}

#[test]
fn or_is_satisfied_by_either_side() {
    let mut expr = parse_condition("runlevel RUNLEVEL=[06] or shutdown").unwrap();

    assert!(!offer(&mut expr, 1, "runlevel", &["RUNLEVEL=2"]));
    assert!(!expr.value());

    assert!(offer(&mut expr, 2, "shutdown", &[]));
    assert!(expr.value());
}

#[test]
fn positional_patterns_match_env_by_index() {
    let mut expr = parse_condition("net-device-added eth*").unwrap();

    let env = EnvTable::from_entries(["eth0"]);
    assert!(expr.handle(ev(1), "net-device-added", &env, None, None));
    assert!(expr.value());

    expr.reset();
    let env = EnvTable::from_entries(["wlan0"]);
    assert!(!expr.handle(ev(2), "net-device-added", &env, None, None));
    assert!(!expr.value());
}

#[test]
fn patterns_expand_against_job_env() {
    let mut expr = parse_condition("stopped JOB=$JOB").unwrap();
    let job_env = EnvTable::from_entries(["JOB=mysql"]);

    let env = EnvTable::from_entries(["JOB=apache"]);
    assert!(!expr.handle(ev(1), "stopped", &env, None, Some(&job_env)));

    let env = EnvTable::from_entries(["JOB=mysql"]);
    assert!(expr.handle(ev(2), "stopped", &env, None, Some(&job_env)));
    assert!(expr.value());
}

#[test]
fn expansion_failure_means_no_match() {
    let mut expr = parse_condition("stopped JOB=$MISSING").unwrap();
    let job_env = EnvTable::new();

    let env = EnvTable::from_entries(["JOB=mysql"]);
    assert!(!expr.handle(ev(1), "stopped", &env, None, Some(&job_env)));
}

#[test]
fn environment_collects_prefix_and_captured_env() {
    let mut expr = parse_condition("started JOB=a and started JOB=b").unwrap();
    offer(&mut expr, 1, "started", &["JOB=a", "PORT=80"]);
    offer(&mut expr, 2, "started", &["JOB=b"]);

    let mut sink = EnvTable::new();
    expr.environment(&mut sink, "STOKER_EVENTS");

    assert_eq!(sink.get("STOKER_EVENTS"), Some("started started"));
    assert_eq!(sink.get("PORT"), Some("80"));
    // The later capture's JOB wins under replace semantics.
    assert_eq!(sink.get("JOB"), Some("b"));
}

#[test]
fn environment_with_no_matches_still_sets_prefix() {
    let expr = parse_condition("startup").unwrap();
    let mut sink = EnvTable::new();
    expr.environment(&mut sink, "STOKER_EVENTS");
    assert_eq!(sink.get("STOKER_EVENTS"), Some(""));
}

#[test]
fn reset_clears_values_and_captures() {
    let mut expr = parse_condition("startup or shutdown").unwrap();
    offer(&mut expr, 1, "startup", &[]);
    assert!(expr.value());

    expr.reset();
    assert!(!expr.value());
    assert!(expr.captures().is_empty());
}

#[test]
fn handle_reports_update_even_when_tree_stays_false() {
    // A job only reacts when the current event touched its tree; a tree
    // already true from earlier events reports no update for a stranger.
    let mut expr = parse_condition("started JOB=a and started JOB=b").unwrap();
    assert!(offer(&mut expr, 1, "started", &["JOB=a"]));
    assert!(!offer(&mut expr, 2, "runlevel", &["RUNLEVEL=2"]));
}

#[test]
fn captured_fd_is_retained() {
    let mut expr = parse_condition("socket").unwrap();
    let env = EnvTable::new();
    expr.handle(ev(1), "socket", &env, Some(7), None);

    let captures = expr.captures();
    assert_eq!(captures[0].1.fd, Some(7));
}
