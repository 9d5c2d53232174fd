// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_class_defaults() {
    let class = JobClass::new("mysql");

    assert_eq!(class.name, "mysql");
    assert_eq!(class.instance, "");
    assert_eq!(class.expect, Expect::None);
    assert!(!class.task);
    assert!(!class.respawn);
    assert!(!class.deleted);
    assert_eq!(class.kill_timeout_secs, DEFAULT_KILL_TIMEOUT_SECS);
    assert!(class.instances.is_empty());
}

#[test]
fn process_lookup() {
    let mut class = JobClass::new("getty");
    class
        .processes
        .insert(ProcessRole::Main, ProcessSpec::Exec(vec!["/sbin/getty".into()]));

    assert!(class.has_process(ProcessRole::Main));
    assert!(!class.has_process(ProcessRole::PreStart));
    assert_eq!(
        class.process(ProcessRole::Main),
        Some(&ProcessSpec::Exec(vec!["/sbin/getty".into()]))
    );
}

#[test]
fn normal_exit_includes_zero_and_listed_statuses() {
    let mut class = JobClass::new("worker");
    class.normal_exit = vec![1, 15 << 8];

    assert!(class.exit_is_normal(0));
    assert!(class.exit_is_normal(1));
    assert!(class.exit_is_normal(15 << 8));
    assert!(!class.exit_is_normal(2));
}

#[test]
fn builder_produces_usable_class() {
    let class = JobClass::builder().name("web").task(true).respawn(true).build();

    assert_eq!(class.name, "web");
    assert!(class.task);
    assert!(class.respawn);
}

#[test]
fn respawn_policy_default_matches_historical_values() {
    let policy = RespawnPolicy::default();
    assert_eq!(policy.count, 10);
    assert_eq!(policy.interval_secs, 5);
}
