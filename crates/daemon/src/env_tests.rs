// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn lock_path_sits_next_to_the_socket() {
    let lock = lock_path();
    assert_eq!(lock.extension().and_then(|e| e.to_str()), Some("pid"));
    assert_eq!(lock.parent(), socket_path().parent());
}

#[test]
fn ipc_timeout_has_a_sane_default() {
    // The override env var is not set under test.
    assert!(ipc_timeout() >= Duration::from_secs(1));
}
