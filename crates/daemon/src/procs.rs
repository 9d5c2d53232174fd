// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real process operations on top of `std::process` and `nix`.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::{Command, Stdio};
use stoker_core::{KillSignal, ProcessOps, ProcessSpec, SpawnError, SpawnSpec};
use tracing::warn;

/// Spawns children with the job's environment and delivers signals.
///
/// Children inherit the daemon's stdout/stderr; capture is the log
/// collaborator's concern and is disabled entirely under `--no-log`.
#[derive(Debug, Default)]
pub struct RealProcessOps {
    quiet: bool,
}

impl RealProcessOps {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProcessOps for RealProcessOps {
    fn spawn(&mut self, spec: SpawnSpec<'_>) -> Result<u32, SpawnError> {
        let fail = |message: String| SpawnError { role: spec.role, message };

        let mut command = match spec.process {
            ProcessSpec::Exec(argv) => {
                let mut expanded = Vec::with_capacity(argv.len());
                for arg in argv {
                    expanded.push(
                        spec.env.expand(arg).map_err(|e| fail(e.to_string()))?,
                    );
                }
                let Some(program) = expanded.first().cloned() else {
                    return Err(fail("empty command".to_string()));
                };
                let mut command = Command::new(program);
                command.args(&expanded[1..]);
                command
            }
            ProcessSpec::Script(body) => {
                let mut command = Command::new("/bin/sh");
                command.arg("-e").arg("-c").arg(body);
                command
            }
        };

        command.env_clear();
        for entry in spec.env.iter() {
            if let Some((key, value)) = entry.split_once('=') {
                command.env(key, value);
            }
        }

        command.stdin(Stdio::null());
        if self.quiet {
            command.stdout(Stdio::null());
            command.stderr(Stdio::null());
        }

        let child = command.spawn().map_err(|e| fail(e.to_string()))?;
        Ok(child.id())
    }

    fn kill(&mut self, pid: u32, signal: KillSignal) {
        let signal = match signal {
            KillSignal::Term => Signal::SIGTERM,
            KillSignal::Kill => Signal::SIGKILL,
        };
        if let Err(err) = kill(Pid::from_raw(pid as i32), signal) {
            warn!("failed to signal process {pid}: {err}");
        }
    }
}
