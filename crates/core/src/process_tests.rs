// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn signal_names_map_both_ways() {
    assert_eq!(signal_name(15), Some("TERM"));
    assert_eq!(signal_number("TERM"), Some(15));
    assert_eq!(signal_number("SIGTERM"), Some(15));
    assert_eq!(signal_name(7), None);
    assert_eq!(signal_number("NOPE"), None);
}

#[test]
fn kill_signal_display() {
    assert_eq!(KillSignal::Term.to_string(), "TERM");
    assert_eq!(KillSignal::Kill.to_string(), "KILL");
}
