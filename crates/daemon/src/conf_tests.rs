// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use stoker_core::job::ProcessRole;
use yare::parameterized;

const GETTY: &str = r#"
description = "serial console"
instance = "$TTY"
start-on = "runlevel RUNLEVEL=[2345]"
stop-on = "runlevel RUNLEVEL=[!2345]"
respawn = true
respawn-limit = { count = 10, interval-secs = 5 }
kill-timeout-secs = 30
export = ["RUNLEVEL"]
normal-exit = [0, "TERM"]

[env]
TERM = "vt102"

[process.main]
exec = ["/sbin/getty", "-8", "38400", "$TTY"]

[process.pre-start]
script = "test -c /dev/$TTY"
"#;

#[test]
fn full_class_file_parses() {
    let class = load_class_file("getty", GETTY).unwrap();

    assert_eq!(class.name, "getty");
    assert_eq!(class.description.as_deref(), Some("serial console"));
    assert_eq!(class.instance, "$TTY");
    assert!(class.start_on.is_some());
    assert!(class.stop_on.is_some());
    assert!(class.respawn);
    assert_eq!(class.respawn_limit.count, 10);
    assert_eq!(class.respawn_limit.interval_secs, 5);
    assert_eq!(class.kill_timeout_secs, 30);
    assert_eq!(class.export, ["RUNLEVEL"]);
    assert_eq!(class.normal_exit, [0, 15 << 8]);
    assert_eq!(class.env.get("TERM"), Some("vt102"));

    assert!(matches!(
        class.process(ProcessRole::Main),
        Some(ProcessSpec::Exec(argv)) if argv[0] == "/sbin/getty"
    ));
    assert!(matches!(
        class.process(ProcessRole::PreStart),
        Some(ProcessSpec::Script(_))
    ));
}

#[test]
fn minimal_task_parses_with_defaults() {
    let class = load_class_file("chore", "task = true\n[process.main]\nexec = [\"/bin/true\"]\n")
        .unwrap();

    assert!(class.task);
    assert!(!class.respawn);
    assert_eq!(class.expect, Expect::None);
    assert!(class.start_on.is_none());
    assert_eq!(class.kill_timeout_secs, 5);
}

#[parameterized(
    none = { "none", Expect::None },
    fork = { "fork", Expect::Fork },
    daemon = { "daemon", Expect::Daemon },
    stop = { "stop", Expect::Stop },
)]
fn expect_modes_parse(name: &str, expect: Expect) {
    let contents = format!("expect = \"{name}\"");
    assert_eq!(load_class_file("c", &contents).unwrap().expect, expect);
}

#[test]
fn unknown_expect_mode_is_rejected() {
    assert!(matches!(
        load_class_file("c", "expect = \"psychic\""),
        Err(ConfError::UnknownExpect(_))
    ));
}

#[test]
fn bad_condition_is_rejected() {
    let result = load_class_file("c", "start-on = \"a and\"");
    assert!(matches!(
        result,
        Err(ConfError::Condition { field: "start-on", .. })
    ));
}

#[test]
fn process_must_pick_exec_or_script() {
    let both = "[process.main]\nexec = [\"/bin/true\"]\nscript = \"true\"\n";
    assert!(matches!(
        load_class_file("c", both),
        Err(ConfError::ProcessSpecConflict(_))
    ));

    let neither = "[process.main]\n";
    assert!(matches!(
        load_class_file("c", neither),
        Err(ConfError::ProcessSpecConflict(_))
    ));
}

#[test]
fn unknown_process_role_is_rejected() {
    let result = load_class_file("c", "[process.sidecar]\nexec = [\"/bin/true\"]\n");
    assert!(matches!(result, Err(ConfError::UnknownRole(_))));
}

#[test]
fn bad_normal_exit_entry_is_rejected() {
    let result = load_class_file("c", "normal-exit = [\"SIGWEIRD\"]");
    assert!(matches!(result, Err(ConfError::BadNormalExit(_))));
}

#[test]
fn unknown_top_level_key_is_rejected() {
    assert!(load_class_file("c", "colour = \"red\"").is_err());
}

#[test]
fn load_conf_dir_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("good.toml"),
        "task = true\n[process.main]\nexec = [\"/bin/true\"]\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("bad.toml"), "start-on = \"((\"").unwrap();
    std::fs::write(dir.path().join("ignored.conf"), "not toml").unwrap();

    let classes = load_conf_dir(dir.path()).unwrap();
    let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["good"]);
}

#[test]
fn session_directories_are_scanned_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sessions");
    for name in ["zeta", "alpha"] {
        let sub = root.join(name);
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("svc.toml"), "task = true\n").unwrap();
    }
    // A stray file under sessions/ is not a session.
    std::fs::write(root.join("stray.toml"), "task = true\n").unwrap();

    let sessions = load_session_dirs(dir.path()).unwrap();
    let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["alpha", "zeta"]);
    assert_eq!(sessions[0].conf_path, root.join("alpha"));
    assert_eq!(sessions[0].classes.len(), 1);
    assert_eq!(sessions[0].classes[0].name, "svc");
}

#[test]
fn missing_sessions_directory_means_no_sessions() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_session_dirs(dir.path()).unwrap().is_empty());
}

#[test]
fn load_conf_dir_orders_by_name() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["zeta", "alpha", "mid"] {
        std::fs::write(dir.path().join(format!("{name}.toml")), "task = true\n").unwrap();
    }

    let classes = load_conf_dir(dir.path()).unwrap();
    let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
}
