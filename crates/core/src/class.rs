// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job classes: the templates instances are stamped from.

use crate::env::EnvTable;
use crate::expression::Expr;
use crate::id::{JobId, SessionId};
use crate::job::ProcessRole;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// How a class signals that its main process is really up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    /// Up as soon as the spawn returns.
    #[default]
    None,
    /// Up after the process forks once.
    Fork,
    /// Up after the process daemonizes (forks twice).
    Daemon,
    /// Up when the process raises SIGSTOP.
    Stop,
}

crate::simple_display! {
    Expect {
        None => "none",
        Fork => "fork",
        Daemon => "daemon",
        Stop => "stop",
    }
}

/// What to run for one process role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessSpec {
    /// An argv vector, `$VAR`-expanded against the job environment.
    Exec(Vec<String>),
    /// A shell fragment run via `/bin/sh -e -c`.
    Script(String),
}

/// Cap on automatic restarts within a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnPolicy {
    pub count: u32,
    pub interval_secs: u64,
}

impl Default for RespawnPolicy {
    fn default() -> Self {
        // 10 respawns in 5 seconds, the historical default.
        Self { count: 10, interval_secs: 5 }
    }
}

/// Default seconds between TERM and the KILL escalation.
pub const DEFAULT_KILL_TIMEOUT_SECS: u64 = 5;

/// A template describing a managed service or task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobClass {
    pub name: SmolStr,
    #[serde(default)]
    pub description: Option<String>,
    /// Instance-name template, expanded against the start environment.
    /// Empty for non-multiplexed classes.
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub start_on: Option<Expr>,
    #[serde(default)]
    pub stop_on: Option<Expr>,
    /// Defaults merged into every instance's environment.
    #[serde(default)]
    pub env: EnvTable,
    /// Keys copied from the job env into emitted lifecycle events.
    #[serde(default)]
    pub export: Vec<String>,
    #[serde(default)]
    pub processes: IndexMap<ProcessRole, ProcessSpec>,
    #[serde(default)]
    pub expect: Expect,
    /// A task runs to completion; a service's rest state is `Running`.
    #[serde(default)]
    pub task: bool,
    #[serde(default)]
    pub respawn: bool,
    #[serde(default)]
    pub respawn_limit: RespawnPolicy,
    /// Exit statuses of the main process that do not count as failures
    /// (signal terminations encoded as `signal << 8`).
    #[serde(default)]
    pub normal_exit: Vec<i32>,
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout_secs: u64,
    #[serde(default)]
    pub session: Option<SessionId>,
    /// Tombstone: the definition was removed but instances remain.
    #[serde(default)]
    pub deleted: bool,
    /// Active instances by name.
    #[serde(skip)]
    pub instances: IndexMap<String, JobId>,
}

fn default_kill_timeout() -> u64 {
    DEFAULT_KILL_TIMEOUT_SECS
}

impl JobClass {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instance: String::new(),
            start_on: None,
            stop_on: None,
            env: EnvTable::new(),
            export: Vec::new(),
            processes: IndexMap::new(),
            expect: Expect::None,
            task: false,
            respawn: false,
            respawn_limit: RespawnPolicy::default(),
            normal_exit: Vec::new(),
            kill_timeout_secs: DEFAULT_KILL_TIMEOUT_SECS,
            session: None,
            deleted: false,
            instances: IndexMap::new(),
        }
    }

    pub fn process(&self, role: ProcessRole) -> Option<&ProcessSpec> {
        self.processes.get(&role)
    }

    pub fn has_process(&self, role: ProcessRole) -> bool {
        self.processes.contains_key(&role)
    }

    /// Whether `status` counts as a normal exit for the main process.
    pub fn exit_is_normal(&self, status: i32) -> bool {
        status == 0 || self.normal_exit.contains(&status)
    }
}

crate::builder! {
    pub struct JobClassBuilder => JobClass {
        into {
            name: SmolStr = "test",
            instance: String = "",
        }
        set {
            start_on: Option<Expr> = None,
            stop_on: Option<Expr> = None,
            env: EnvTable = EnvTable::new(),
            export: Vec<String> = Vec::new(),
            processes: IndexMap<ProcessRole, ProcessSpec> = IndexMap::new(),
            expect: Expect = Expect::None,
            task: bool = false,
            respawn: bool = false,
            respawn_limit: RespawnPolicy = RespawnPolicy::default(),
            normal_exit: Vec<i32> = Vec::new(),
            kill_timeout_secs: u64 = DEFAULT_KILL_TIMEOUT_SECS,
            session: Option<SessionId> = None,
            deleted: bool = false,
        }
        option {
            description: String = None,
        }
        computed {
            instances: IndexMap<String, JobId> = IndexMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "class_tests.rs"]
mod tests;
