// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job instances and their lifecycle vocabulary.

use crate::blocking::Blocked;
use crate::env::EnvTable;
use crate::expression::Expr;
use crate::id::{EventId, SessionId};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The operator-requested target for a job.
///
/// `Respawn` is transient: it marks a main process that died while a
/// lifecycle script was still running, and collapses back to `Start` when
/// the state machine consults it at `PostStart`/`PreStop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Stop,
    Start,
    Respawn,
}

crate::simple_display! {
    Goal {
        Stop => "stop",
        Start => "start",
        Respawn => "respawn",
    }
}

impl Goal {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stop" => Some(Goal::Stop),
            "start" => Some(Goal::Start),
            "respawn" => Some(Goal::Respawn),
            _ => None,
        }
    }
}

/// Lifecycle states of a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Waiting,
    Starting,
    PreStart,
    Spawned,
    PostStart,
    Running,
    PreStop,
    Stopping,
    Killed,
    PostStop,
}

crate::simple_display! {
    State {
        Waiting => "waiting",
        Starting => "starting",
        PreStart => "pre-start",
        Spawned => "spawned",
        PostStart => "post-start",
        Running => "running",
        PreStop => "pre-stop",
        Stopping => "stopping",
        Killed => "killed",
        PostStop => "post-stop",
    }
}

impl State {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "waiting" => Some(State::Waiting),
            "starting" => Some(State::Starting),
            "pre-start" => Some(State::PreStart),
            "spawned" => Some(State::Spawned),
            "post-start" => Some(State::PostStart),
            "running" => Some(State::Running),
            "pre-stop" => Some(State::PreStop),
            "stopping" => Some(State::Stopping),
            "killed" => Some(State::Killed),
            "post-stop" => Some(State::PostStop),
            _ => None,
        }
    }
}

/// Process roles a class may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRole {
    Main,
    PreStart,
    PostStart,
    PreStop,
    PostStop,
}

crate::simple_display! {
    ProcessRole {
        Main => "main",
        PreStart => "pre-start",
        PostStart => "post-start",
        PreStop => "pre-stop",
        PostStop => "post-stop",
    }
}

impl ProcessRole {
    pub const ALL: [ProcessRole; 5] = [
        ProcessRole::Main,
        ProcessRole::PreStart,
        ProcessRole::PostStart,
        ProcessRole::PreStop,
        ProcessRole::PostStop,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "main" => Some(ProcessRole::Main),
            "pre-start" => Some(ProcessRole::PreStart),
            "post-start" => Some(ProcessRole::PostStart),
            "pre-stop" => Some(ProcessRole::PreStop),
            "post-stop" => Some(ProcessRole::PostStop),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            ProcessRole::Main => 0,
            ProcessRole::PreStart => 1,
            ProcessRole::PostStart => 2,
            ProcessRole::PreStop => 3,
            ProcessRole::PostStop => 4,
        }
    }
}

/// PIDs of a job's running processes, one slot per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessTable {
    pids: [Option<u32>; 5],
}

impl ProcessTable {
    pub fn get(&self, role: ProcessRole) -> Option<u32> {
        self.pids[role.index()]
    }

    pub fn set(&mut self, role: ProcessRole, pid: u32) {
        self.pids[role.index()] = Some(pid);
    }

    pub fn clear(&mut self, role: ProcessRole) {
        self.pids[role.index()] = None;
    }

    /// Find which role a PID belongs to.
    pub fn role_of(&self, pid: u32) -> Option<ProcessRole> {
        ProcessRole::ALL.into_iter().find(|role| self.get(*role) == Some(pid))
    }

    /// `(role, pid)` pairs for every live process, in role order.
    pub fn live(&self) -> Vec<(ProcessRole, u32)> {
        ProcessRole::ALL
            .into_iter()
            .filter_map(|role| self.get(role).map(|pid| (role, pid)))
            .collect()
    }
}

/// The failure record of a job; set at most once per visit to `Waiting`.
///
/// `process` is `None` for a respawn-limit failure; `status` is `-1` for a
/// spawn failure (no exit information exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub process: Option<ProcessRole>,
    pub status: i32,
}

/// An instance of a class in a specific lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Name of the owning class in the registry.
    pub class: SmolStr,
    /// Instance name; empty for the sole instance of a non-multiplexed class.
    pub name: String,
    /// Session scope, copied from the class at creation.
    pub session: Option<SessionId>,
    pub goal: Goal,
    pub state: State,
    pub env: EnvTable,
    pub start_env: Option<EnvTable>,
    pub stop_env: Option<EnvTable>,
    /// Per-instance copy of the class's stop condition, so captured
    /// environment survives across its evaluation.
    pub stop_on: Option<Expr>,
    /// File descriptors collected from fd-bearing start events.
    pub fds: Vec<i32>,
    pub pids: ProcessTable,
    /// Event this job is waiting on to finish, if any.
    pub blocker: Option<EventId>,
    /// Links released when this job reaches a rest state or fails.
    pub blocking: Vec<Blocked>,
    pub failure: Option<Failure>,
    /// Epoch-ms deadline for escalating TERM to KILL.
    pub kill_timer_due: Option<u64>,
    /// Start of the current respawn-accounting window, epoch seconds.
    pub respawn_time: u64,
    /// Respawns within the current window.
    pub respawn_count: u32,
}

impl Job {
    pub fn new(
        class: impl Into<SmolStr>,
        name: impl Into<String>,
        session: Option<SessionId>,
        stop_on: Option<Expr>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            session,
            goal: Goal::Stop,
            state: State::Waiting,
            env: EnvTable::new(),
            start_env: None,
            stop_env: None,
            stop_on,
            fds: Vec::new(),
            pids: ProcessTable::default(),
            blocker: None,
            blocking: Vec::new(),
            failure: None,
            kill_timer_due: None,
            respawn_time: 0,
            respawn_count: 0,
        }
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Record the respawn for rate limiting. Returns true when the limit
    /// is exceeded within the window.
    pub fn respawn_exceeds_limit(&mut self, now_secs: u64, limit: u32, interval_secs: u64) -> bool {
        if self.respawn_time + interval_secs <= now_secs {
            self.respawn_time = now_secs;
            self.respawn_count = 0;
        }
        self.respawn_count += 1;
        self.respawn_count > limit
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
