// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn new_event_is_pending_and_unblocked() {
    let event = Event::new("startup", EnvTable::new(), None);

    assert_eq!(event.progress, Progress::Pending);
    assert!(!event.failed);
    assert_eq!(event.blockers, 0);
    assert!(event.blocking.is_empty());
    assert_eq!(event.fd, None);
}

#[test]
#[should_panic(expected = "event name must not be empty")]
fn empty_name_is_rejected() {
    let _ = Event::new("", EnvTable::new(), None);
}

#[parameterized(
    pending = { Progress::Pending, 0 },
    handling = { Progress::Handling, 1 },
    finished = { Progress::Finished, 2 },
)]
fn progress_encoding_round_trips(progress: Progress, raw: u8) {
    assert_eq!(progress.as_u8(), raw);
    assert_eq!(Progress::from_u8(raw), Some(progress));
}

#[test]
fn progress_out_of_range_is_invalid() {
    assert_eq!(Progress::from_u8(3), None);
    assert_eq!(Progress::from_u8(255), None);
}

#[test]
fn failed_follow_on_skips_failed_events() {
    let mut event = Event::new("stopping", EnvTable::new(), None);
    event.failed = true;
    assert!(event.wants_failed_follow_on());

    let mut event = Event::new("stopping/failed", EnvTable::new(), None);
    event.failed = true;
    assert!(!event.wants_failed_follow_on());

    let event = Event::new("stopping", EnvTable::new(), None);
    assert!(!event.wants_failed_follow_on());
}
