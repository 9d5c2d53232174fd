// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's seam to the operating system.
//!
//! Spawning forks and execs, then returns control immediately; exits are
//! delivered later through [`crate::Engine::child_exited`]. The daemon
//! implements this on real processes, tests use the recording fake.

use crate::class::ProcessSpec;
use crate::env::EnvTable;
use crate::job::ProcessRole;
use thiserror::Error;

/// Signals the engine sends to processes it manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Term,
    Kill,
}

crate::simple_display! {
    KillSignal {
        Term => "TERM",
        Kill => "KILL",
    }
}

/// A spawn failure. Operational, never fatal to the engine: it is recorded
/// on the job and surfaced through the failure machinery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to spawn {role} process: {message}")]
pub struct SpawnError {
    pub role: ProcessRole,
    pub message: String,
}

/// Everything needed to start one process of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec<'a> {
    pub class: &'a str,
    pub instance: &'a str,
    pub role: ProcessRole,
    pub process: &'a ProcessSpec,
    pub env: &'a EnvTable,
    /// Descriptors collected from fd-bearing start events, passed through.
    pub fds: &'a [i32],
}

/// Operations the engine needs from the process layer.
pub trait ProcessOps {
    /// Fork and exec the process, returning its PID without waiting.
    fn spawn(&mut self, spec: SpawnSpec<'_>) -> Result<u32, SpawnError>;

    /// Deliver a signal to a previously spawned process. Failures are the
    /// caller's to log; a missing process is not an engine error.
    fn kill(&mut self, pid: u32, signal: KillSignal);
}

/// Conventional name for a termination signal (`EXIT_SIGNAL`, class
/// `normal-exit` lists).
pub fn signal_name(signum: i32) -> Option<&'static str> {
    SIGNALS.iter().find(|(num, _)| *num == signum).map(|(_, name)| *name)
}

/// Signal number for a conventional name; accepts an optional `SIG` prefix.
pub fn signal_number(name: &str) -> Option<i32> {
    let name = name.strip_prefix("SIG").unwrap_or(name);
    SIGNALS.iter().find(|(_, n)| *n == name).map(|(num, _)| *num)
}

const SIGNALS: [(i32, &str); 14] = [
    (1, "HUP"),
    (2, "INT"),
    (3, "QUIT"),
    (4, "ILL"),
    (5, "TRAP"),
    (6, "ABRT"),
    (8, "FPE"),
    (9, "KILL"),
    (10, "USR1"),
    (11, "SEGV"),
    (12, "USR2"),
    (13, "PIPE"),
    (14, "ALRM"),
    (15, "TERM"),
];

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
