// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stateful re-exec: hand the serialized engine to a fresh image of
//! ourselves over an inherited pipe.

use nix::unistd::{execv, pipe};
use std::ffi::CString;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use thiserror::Error;

/// The state rides in the pipe buffer across the exec, so it must fit in
/// one unscheduled write.
const MAX_STATE_BYTES: usize = 60 * 1024;

#[derive(Debug, Error)]
pub enum ReexecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system error: {0}")]
    Sys(#[from] nix::Error),

    #[error("argument contains a NUL byte")]
    BadArgument(#[from] std::ffi::NulError),

    #[error("state document of {0} bytes exceeds the pipe hand-off limit")]
    StateTooLarge(usize),
}

/// Write `state` into a fresh pipe and exec the current binary with
/// `--restart --state-fd <fd>` appended to `args`.
///
/// On success this never returns; an `Ok` cannot be observed.
pub fn exec_with_state(state: &[u8], args: &[String]) -> Result<(), ReexecError> {
    if state.len() > MAX_STATE_BYTES {
        return Err(ReexecError::StateTooLarge(state.len()));
    }

    let (read_end, write_end) = pipe()?;

    {
        let mut writer = File::from(write_end);
        writer.write_all(state)?;
        // Dropping the writer closes it, so the child sees EOF.
    }

    let exe = std::env::current_exe()?;
    let exe = exe.display().to_string();

    let mut argv: Vec<String> = vec![exe.clone()];
    argv.extend(args.iter().cloned());
    argv.push("--restart".to_string());
    argv.push("--state-fd".to_string());
    argv.push(read_end.as_raw_fd().to_string());

    let c_exe = CString::new(exe)?;
    let c_argv: Vec<CString> = argv
        .into_iter()
        .map(CString::new)
        .collect::<Result<_, _>>()?;

    // The pipe's read end has no close-on-exec flag; it survives into the
    // new image. execv only returns on failure.
    execv(&c_exe, &c_argv)?;
    Ok(())
}

/// Read the full state document from an inherited descriptor.
///
/// `/dev/fd` gives a fresh description of the descriptor without any
/// unsafe ownership claims.
pub fn read_state_fd(fd: i32) -> Result<Vec<u8>, ReexecError> {
    let mut buf = Vec::new();
    File::open(format!("/dev/fd/{fd}"))?.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
#[path = "reexec_tests.rs"]
mod tests;
