// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::fd::AsRawFd;

#[test]
fn state_fd_round_trips_through_dev_fd() {
    let (read_end, write_end) = nix::unistd::pipe().unwrap();
    {
        let mut writer = File::from(write_end);
        writer.write_all(b"{\"version\":1}").unwrap();
    }

    let raw = read_state_fd(read_end.as_raw_fd()).unwrap();
    assert_eq!(raw, b"{\"version\":1}");
}

#[test]
fn oversized_state_is_refused() {
    let huge = vec![b' '; MAX_STATE_BYTES + 1];
    let result = exec_with_state(&huge, &[]);
    assert!(matches!(result, Err(ReexecError::StateTooLarge(_))));
}

#[test]
fn missing_state_fd_is_an_error() {
    // Descriptor 999 is not open in the test process.
    assert!(read_state_fd(999).is_err());
}
