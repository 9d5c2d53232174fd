// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn entry(role: &str, pid: u32) -> ProcessEntry {
    ProcessEntry { role: role.to_string(), pid }
}

#[parameterized(
    resting = { "", "stop", "waiting", "web stop/waiting" },
    named = { "tty1", "start", "running", "web (tty1) start/running" },
)]
fn bare_status_lines(instance: &str, goal: &str, state: &str, expected: &str) {
    assert_eq!(format_status("web", instance, goal, state, &[]), expected);
}

#[test]
fn main_process_renders_without_role() {
    let line = format_status("web", "", "start", "running", &[entry("main", 1234)]);
    assert_eq!(line, "web start/running, process 1234");
}

#[test]
fn auxiliary_processes_render_with_role() {
    let line = format_status(
        "web",
        "",
        "start",
        "post-start",
        &[entry("main", 1234), entry("post-start", 1240)],
    );
    assert_eq!(line, "web start/post-start, process 1234, post-start process 1240");
}
