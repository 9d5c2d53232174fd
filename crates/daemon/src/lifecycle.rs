// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: lock acquisition, socket binding, cleanup.

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::info;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon already holds {0}")]
    AlreadyRunning(PathBuf),
}

/// Filesystem footprint of a running daemon. The listener is returned
/// separately from startup so the accept loop can own it.
pub struct DaemonContext {
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the PID lock and bind the control socket.
///
/// The lock is taken before anything is truncated or unlinked, so a
/// second daemon cannot damage the files of the one already running.
pub fn startup(
    socket_path: PathBuf,
    lock_path: PathBuf,
) -> Result<(DaemonContext, UnixListener), LifecycleError> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::AlreadyRunning(lock_path));
    }

    // Write our PID now that the lock is held.
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // A stale socket from a crashed daemon is safe to replace: the lock
    // proves nobody is serving it.
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    info!("listening on {}", socket_path.display());

    Ok((DaemonContext { socket_path, lock_path, lock_file }, listener))
}

impl DaemonContext {
    /// Remove the socket and PID files on orderly shutdown.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
