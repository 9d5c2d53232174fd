// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers: the recording fake process adapter.

use crate::class::ProcessSpec;
use crate::env::EnvTable;
use crate::job::ProcessRole;
use crate::process::{KillSignal, ProcessOps, SpawnError, SpawnSpec};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// One recorded spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    pub class: String,
    pub instance: String,
    pub role: ProcessRole,
    pub process: ProcessSpec,
    pub env: EnvTable,
    pub fds: Vec<i32>,
    pub pid: u32,
}

#[derive(Default)]
struct FakeState {
    next_pid: u32,
    spawns: Vec<SpawnRecord>,
    kills: Vec<(u32, KillSignal)>,
    failing_roles: HashSet<ProcessRole>,
}

/// A [`ProcessOps`] that records every spawn and kill, hands out
/// sequential PIDs from 100, and can inject spawn failures per role.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// the adapter.
#[derive(Clone, Default)]
pub struct FakeProcessOps {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every spawn of `role` fail from now on.
    pub fn fail_spawns_of(&self, role: ProcessRole) {
        self.state.lock().failing_roles.insert(role);
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.state.lock().spawns.clone()
    }

    pub fn kills(&self) -> Vec<(u32, KillSignal)> {
        self.state.lock().kills.clone()
    }

    /// PID handed out by the most recent spawn.
    pub fn last_pid(&self) -> Option<u32> {
        self.state.lock().spawns.last().map(|s| s.pid)
    }

    /// Roles spawned so far, in order.
    pub fn spawned_roles(&self) -> Vec<ProcessRole> {
        self.state.lock().spawns.iter().map(|s| s.role).collect()
    }
}

impl ProcessOps for FakeProcessOps {
    fn spawn(&mut self, spec: SpawnSpec<'_>) -> Result<u32, SpawnError> {
        let mut state = self.state.lock();
        if state.failing_roles.contains(&spec.role) {
            return Err(SpawnError {
                role: spec.role,
                message: "no such file or directory".to_string(),
            });
        }

        let pid = 100 + state.next_pid;
        state.next_pid += 1;
        state.spawns.push(SpawnRecord {
            class: spec.class.to_string(),
            instance: spec.instance.to_string(),
            role: spec.role,
            process: spec.process.clone(),
            env: spec.env.clone(),
            fds: spec.fds.to_vec(),
            pid,
        });
        Ok(pid)
    }

    fn kill(&mut self, pid: u32, signal: KillSignal) {
        self.state.lock().kills.push((pid, signal));
    }
}
