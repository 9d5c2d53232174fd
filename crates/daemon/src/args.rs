// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments of `stokerd`.

use clap::Parser;
use std::path::PathBuf;

/// Event-driven service supervisor.
#[derive(Debug, Clone, Parser)]
#[command(name = "stokerd", version)]
pub struct Args {
    /// Directory to load class definitions from
    #[arg(long, value_name = "DIR")]
    pub confdir: Option<PathBuf>,

    /// Directory to store job output logs in
    #[arg(long, value_name = "DIR")]
    pub logdir: Option<PathBuf>,

    /// Disable job logging
    #[arg(long)]
    pub no_log: bool,

    /// Disable user and chroot sessions
    #[arg(long)]
    pub no_sessions: bool,

    /// Do not emit any startup event
    #[arg(long)]
    pub no_startup_event: bool,

    /// Emit this event instead of the default on startup
    #[arg(long, value_name = "NAME")]
    pub startup_event: Option<String>,

    /// Flag that a re-exec has occurred
    #[arg(long)]
    pub restart: bool,

    /// File descriptor to read serialized state from
    #[arg(long, value_name = "FD")]
    pub state_fd: Option<i32>,

    /// Run as a session supervisor rather than process 1
    #[arg(long)]
    pub session: bool,
}

impl Args {
    /// The startup event to emit, if any.
    pub fn startup_event(&self) -> Option<&str> {
        if self.no_startup_event || self.restart {
            return None;
        }
        Some(
            self.startup_event
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(crate::env::DEFAULT_STARTUP_EVENT),
        )
    }

    /// Arguments to pass a re-exec'd self, minus the state hand-off flags
    /// that the re-exec machinery appends itself.
    pub fn reexec_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(dir) = &self.confdir {
            args.push("--confdir".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(dir) = &self.logdir {
            args.push("--logdir".to_string());
            args.push(dir.display().to_string());
        }
        if self.no_log {
            args.push("--no-log".to_string());
        }
        if self.no_sessions {
            args.push("--no-sessions".to_string());
        }
        if self.session {
            args.push("--session".to_string());
        }
        args
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
