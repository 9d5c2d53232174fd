// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn startup_binds_socket_and_writes_pid() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("control.sock");
    let lock = dir.path().join("control.pid");

    let (context, _listener) = startup(socket.clone(), lock.clone()).unwrap();

    assert!(socket.exists());
    let pid: u32 = std::fs::read_to_string(&lock).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());

    context.cleanup();
    assert!(!socket.exists());
    assert!(!lock.exists());
}

#[tokio::test]
async fn second_daemon_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("control.sock");
    let lock = dir.path().join("control.pid");

    let (_context, _listener) = startup(socket.clone(), lock.clone()).unwrap();

    let second = startup(dir.path().join("other.sock"), lock.clone());
    assert!(matches!(second, Err(LifecycleError::AlreadyRunning(_))));
}

#[tokio::test]
async fn stale_socket_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("control.sock");
    let lock = dir.path().join("control.pid");
    std::fs::write(&socket, b"stale").unwrap();

    let result = startup(socket.clone(), lock);
    assert!(result.is_ok());
}
