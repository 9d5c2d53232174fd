// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event records for the three-phase queue.

use crate::blocking::Blocked;
use crate::env::EnvTable;
use crate::id::SessionId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Suffix appended to a failed event's name for the follow-on event.
pub const FAILED_SUFFIX: &str = "/failed";

/// Progression of an event through the queue.
///
/// Pending events have not been offered to the job system yet; handling
/// events have, and stay in the queue while jobs block them; finished
/// events release their blocking list and are destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    Pending,
    Handling,
    Finished,
}

impl Progress {
    /// Numeric encoding used by the persisted state document.
    pub fn as_u8(self) -> u8 {
        match self {
            Progress::Pending => 0,
            Progress::Handling => 1,
            Progress::Finished => 2,
        }
    }

    /// Decode from the persisted encoding. Values outside {0,1,2} are invalid.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Progress::Pending),
            1 => Some(Progress::Handling),
            2 => Some(Progress::Finished),
            _ => None,
        }
    }
}

crate::simple_display! {
    Progress {
        Pending => "pending",
        Handling => "handling",
        Finished => "finished",
    }
}

/// A queued event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name; never empty.
    pub name: SmolStr,
    /// Environment the event carries, copied into anything it triggers.
    pub env: EnvTable,
    /// Session scope; `None` means global.
    pub session: Option<SessionId>,
    /// File descriptor carried by bridge events, passed to spawned jobs.
    pub fd: Option<i32>,
    pub progress: Progress,
    /// Meaningful once the event finishes; set by failing jobs it started.
    pub failed: bool,
    /// Number of outstanding unblocks owed by jobs this event caused to run.
    pub blockers: u32,
    /// Links released when this event finishes.
    pub blocking: Vec<Blocked>,
}

impl Event {
    pub fn new(name: impl Into<SmolStr>, env: EnvTable, session: Option<SessionId>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "event name must not be empty");

        Self {
            name,
            env,
            session,
            fd: None,
            progress: Progress::Pending,
            failed: false,
            blockers: 0,
            blocking: Vec::new(),
        }
    }

    /// Whether a `<name>/failed` follow-on should be emitted when this
    /// event finishes failed.
    pub fn wants_failed_follow_on(&self) -> bool {
        self.failed && !self.name.ends_with(FAILED_SUFFIX)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
