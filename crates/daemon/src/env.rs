// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Daemon version reported on the control endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the event emitted on initial start unless overridden.
pub const DEFAULT_STARTUP_EVENT: &str = "startup";

/// Resolve the control socket path: `STOKER_SOCKET` > `$XDG_RUNTIME_DIR` >
/// `/tmp` (keyed by UID so unprivileged daemons do not collide).
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("STOKER_SOCKET") {
        return PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("stoker.sock");
    }
    PathBuf::from(format!("/tmp/stoker-{}.sock", nix::unistd::getuid()))
}

/// Lock/PID file next to the socket.
pub fn lock_path() -> PathBuf {
    socket_path().with_extension("pid")
}

/// Default configuration directory when `--confdir` is not given.
pub fn default_confdir() -> PathBuf {
    if let Ok(dir) = std::env::var("STOKER_CONFDIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/etc/stoker")
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    std::env::var("STOKER_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
