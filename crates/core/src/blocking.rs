// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking links between events, jobs, and deferred control replies.
//!
//! Each link is owned by exactly one blocking list: an event's list holds
//! the work released when the event finishes, a job's list holds the work
//! released when the job reaches a rest state or fails. Links are destroyed
//! as they are released; none is ever shared between lists.

use crate::id::{EventId, JobId, Ticket};
use serde::{Deserialize, Serialize};

/// Which control method a deferred reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Start,
    Stop,
    Restart,
    EmitEvent,
}

crate::simple_display! {
    MethodKind {
        Start => "start",
        Stop => "stop",
        Restart => "restart",
        EmitEvent => "emit-event",
    }
}

/// A typed pointer from a waiter to the thing it blocks on.
///
/// `Job` links live on event blocking lists; `Event` links live on job
/// blocking lists (the reverse direction, backing the event's `blockers`
/// count). `Method` links appear on either, depending on what the caller
/// asked to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Blocked {
    /// A job waiting for the event to finish; released by advancing the
    /// job's state machine one step.
    Job { job: JobId },
    /// An event this job contributes a blocker to; released by unblocking
    /// the event (and marking it failed when the job failed).
    Event { event: EventId },
    /// A control request waiting for completion.
    Method { ticket: Ticket, kind: MethodKind },
}

#[cfg(test)]
#[path = "blocking_tests.rs"]
mod tests;
