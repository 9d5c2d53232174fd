// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_reports_the_epoch() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(a > 0);
    assert!(b >= a);
}

#[test]
fn fake_clock_starts_at_fixed_epoch() {
    let clock = FakeClock::new();
    assert_eq!(clock.epoch_ms(), 1_000_000);
    assert_eq!(clock.epoch_secs(), 1_000);
}

#[test]
fn fake_clock_advances_by_duration() {
    let clock = FakeClock::new();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), 1_000_000 + 5_000);

    // Sub-second advances accumulate in milliseconds.
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.epoch_ms(), 1_005_250);
    assert_eq!(clock.epoch_secs(), 1_005);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();

    clock.advance(Duration::from_millis(250));

    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}
