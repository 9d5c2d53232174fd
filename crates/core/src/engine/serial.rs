// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted state document for re-exec hand-off.
//!
//! The schema is complete: queue order, class definitions, instances, and
//! both directions of the blocking relationship all round-trip. A document
//! that fails any cross-reference or range check is rejected outright;
//! there is no best-effort reconstruction.

use super::Engine;
use crate::blocking::{Blocked, MethodKind};
use crate::class::JobClass;
use crate::clock::Clock;
use crate::env::EnvTable;
use crate::error::ControlError;
use crate::event::{Event, Progress};
use crate::expression::Expr;
use crate::id::{EventId, JobId, SessionId, Ticket};
use crate::job::{Failure, Goal, Job, ProcessRole, ProcessTable, State};
use crate::process::ProcessOps;
use crate::session::Session;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use std::collections::{HashMap, HashSet};

/// Current schema version of the state document.
pub const STATE_VERSION: u32 = 1;

/// Errors rejecting a state document.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unsupported state document version {0}")]
    Version(u32),

    #[error("invalid progress value {0}")]
    InvalidProgress(u8),

    #[error("event record with an empty name")]
    EmptyEventName,

    #[error("unknown goal {0:?}")]
    UnknownGoal(String),

    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("unknown process role {0:?}")]
    UnknownRole(String),

    #[error("duplicate record id {0}")]
    DuplicateId(u64),

    #[error("reference to missing event {0}")]
    DanglingEvent(EventId),

    #[error("reference to missing job {0}")]
    DanglingJob(JobId),

    #[error("reference to missing session {0}")]
    DanglingSession(SessionId),

    #[error("job blocker {0} is already finished")]
    FinishedBlocker(EventId),

    #[error("event {0} blocker count does not match its event links")]
    BlockerMismatch(EventId),

    #[error("method-reply link in state document; replies do not survive re-exec")]
    MethodLink,

    #[error("state document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub session: Option<SessionId>,
    /// `-1` when the event carries no descriptor.
    #[serde(default = "no_fd")]
    pub fd: i32,
    #[serde(default)]
    pub env: EnvTable,
    pub progress: u8,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub blockers: u32,
    #[serde(default)]
    pub blocking: Vec<Blocked>,
}

fn no_fd() -> i32 {
    -1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: String,
    pub goal: String,
    pub state: String,
    #[serde(default)]
    pub env: EnvTable,
    #[serde(default)]
    pub start_env: Option<EnvTable>,
    #[serde(default)]
    pub stop_env: Option<EnvTable>,
    #[serde(default)]
    pub stop_on: Option<Expr>,
    #[serde(default)]
    pub fds: Vec<i32>,
    /// Role name to PID for every live process.
    #[serde(default)]
    pub pids: IndexMap<String, u32>,
    #[serde(default)]
    pub blocker: Option<EventId>,
    #[serde(default)]
    pub blocking: Vec<Blocked>,
    #[serde(default)]
    pub failure: Option<Failure>,
    #[serde(default)]
    pub kill_timer_due: Option<u64>,
    #[serde(default)]
    pub respawn_time: u64,
    #[serde(default)]
    pub respawn_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    #[serde(flatten)]
    pub class: JobClass,
    pub instances: Vec<JobRecord>,
}

/// The complete serialized engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    pub version: u32,
    pub sessions: Vec<SessionRecord>,
    pub events: Vec<EventRecord>,
    pub classes: Vec<ClassRecord>,
    pub next_event_id: u64,
    pub next_job_id: u64,
    pub next_session_id: u64,
}

impl<P: ProcessOps, C: Clock> Engine<P, C> {
    /// Complete every deferred method reply with an error and drop the
    /// links. Control connections do not survive an exec; the peers are
    /// told their request failed rather than being left hanging.
    pub fn fail_method_links(&mut self) {
        let mut replies: Vec<(Ticket, ControlError)> = Vec::new();

        for event in self.events.values_mut() {
            event.blocking.retain(|link| match link {
                Blocked::Method { ticket, .. } => {
                    replies.push((*ticket, ControlError::EventFailed));
                    false
                }
                _ => true,
            });
        }
        for job in self.jobs.values_mut() {
            job.blocking.retain(|link| match link {
                Blocked::Method { ticket, kind } => {
                    debug_assert!(!matches!(kind, MethodKind::EmitEvent));
                    replies.push((*ticket, ControlError::JobFailed));
                    false
                }
                _ => true,
            });
        }

        for (ticket, error) in replies {
            self.push_reply(ticket, Err(error));
        }
    }

    /// Snapshot the engine into a state document for re-exec hand-off.
    ///
    /// Deferred method replies are completed with errors first; everything
    /// else round-trips.
    pub fn serialize_state(&mut self) -> StateDoc {
        self.fail_method_links();

        let sessions = self
            .sessions
            .iter()
            .map(|(id, session)| SessionRecord { id: *id, session: session.clone() })
            .collect();

        let events = self
            .events
            .iter()
            .map(|(id, event)| EventRecord {
                id: *id,
                name: event.name.to_string(),
                session: event.session,
                fd: event.fd.unwrap_or(-1),
                env: event.env.clone(),
                progress: event.progress.as_u8(),
                failed: event.failed,
                blockers: event.blockers,
                blocking: event.blocking.clone(),
            })
            .collect();

        let classes = self
            .classes
            .values()
            .map(|class| ClassRecord {
                class: class.clone(),
                instances: class
                    .instances
                    .values()
                    .filter_map(|id| self.jobs.get(id).map(|job| (*id, job)))
                    .map(|(id, job)| JobRecord {
                        id,
                        name: job.name.clone(),
                        goal: job.goal.to_string(),
                        state: job.state.to_string(),
                        env: job.env.clone(),
                        start_env: job.start_env.clone(),
                        stop_env: job.stop_env.clone(),
                        stop_on: job.stop_on.clone(),
                        fds: job.fds.clone(),
                        pids: job
                            .pids
                            .live()
                            .into_iter()
                            .map(|(role, pid)| (role.to_string(), pid))
                            .collect(),
                        blocker: job.blocker,
                        blocking: job.blocking.clone(),
                        failure: job.failure,
                        kill_timer_due: job.kill_timer_due,
                        respawn_time: job.respawn_time,
                        respawn_count: job.respawn_count,
                    })
                    .collect(),
            })
            .collect();

        StateDoc {
            version: STATE_VERSION,
            sessions,
            events,
            classes,
            next_event_id: self.next_event_id(),
            next_job_id: self.next_job_id(),
            next_session_id: self.next_session_id(),
        }
    }

    /// Reconstruct an engine from a state document.
    pub fn restore(procs: P, clock: C, doc: StateDoc) -> Result<Self, StateError> {
        if doc.version != STATE_VERSION {
            return Err(StateError::Version(doc.version));
        }

        let mut engine = Engine::new(procs, clock);

        let mut session_ids: HashSet<SessionId> = HashSet::new();
        for record in doc.sessions {
            if !session_ids.insert(record.id) {
                return Err(StateError::DuplicateId(record.id.as_u64()));
            }
            engine.sessions.insert(record.id, record.session);
        }

        let mut event_ids: HashSet<EventId> = HashSet::new();
        for record in &doc.events {
            if !event_ids.insert(record.id) {
                return Err(StateError::DuplicateId(record.id.as_u64()));
            }
            if let Some(session) = record.session {
                if !session_ids.contains(&session) {
                    return Err(StateError::DanglingSession(session));
                }
            }
        }

        // First pass over jobs: existence and id checks, so event links
        // can be validated while events are rebuilt.
        let mut job_ids: HashSet<JobId> = HashSet::new();
        for class in &doc.classes {
            for job in &class.instances {
                if !job_ids.insert(job.id) {
                    return Err(StateError::DuplicateId(job.id.as_u64()));
                }
            }
        }

        let mut expected_blockers: HashMap<EventId, u32> = HashMap::new();

        for record in doc.events {
            if record.name.is_empty() {
                return Err(StateError::EmptyEventName);
            }
            let progress = Progress::from_u8(record.progress)
                .ok_or(StateError::InvalidProgress(record.progress))?;

            for link in &record.blocking {
                match link {
                    Blocked::Job { job } => {
                        if !job_ids.contains(job) {
                            return Err(StateError::DanglingJob(*job));
                        }
                    }
                    Blocked::Method { .. } => return Err(StateError::MethodLink),
                    Blocked::Event { event } => {
                        return Err(StateError::DanglingEvent(*event));
                    }
                }
            }

            let mut event = Event::new(
                SmolStr::from(record.name),
                record.env,
                record.session,
            );
            event.fd = (record.fd >= 0).then_some(record.fd);
            event.progress = progress;
            event.failed = record.failed;
            event.blockers = record.blockers;
            event.blocking = record.blocking;
            expected_blockers.insert(record.id, 0);
            engine.events.insert(record.id, event);
        }

        for class_record in doc.classes {
            let mut class = class_record.class;
            class.instances = IndexMap::new();

            if let Some(session) = class.session {
                if !session_ids.contains(&session) {
                    return Err(StateError::DanglingSession(session));
                }
            }

            for record in class_record.instances {
                let goal = Goal::from_name(&record.goal)
                    .ok_or_else(|| StateError::UnknownGoal(record.goal.clone()))?;
                let state = State::from_name(&record.state)
                    .ok_or_else(|| StateError::UnknownState(record.state.clone()))?;

                if let Some(blocker) = record.blocker {
                    let event = engine
                        .events
                        .get(&blocker)
                        .ok_or(StateError::DanglingEvent(blocker))?;
                    if event.progress == Progress::Finished {
                        return Err(StateError::FinishedBlocker(blocker));
                    }
                }

                for link in &record.blocking {
                    match link {
                        Blocked::Event { event } => {
                            if !engine.events.contains_key(event) {
                                return Err(StateError::DanglingEvent(*event));
                            }
                            *expected_blockers.entry(*event).or_insert(0) += 1;
                        }
                        Blocked::Method { .. } => return Err(StateError::MethodLink),
                        Blocked::Job { job } => {
                            return Err(StateError::DanglingJob(*job));
                        }
                    }
                }

                let mut pids = ProcessTable::default();
                for (role_name, pid) in &record.pids {
                    let role = ProcessRole::from_name(role_name)
                        .ok_or_else(|| StateError::UnknownRole(role_name.clone()))?;
                    pids.set(role, *pid);
                }

                let mut job =
                    Job::new(class.name.clone(), record.name.clone(), class.session, None);
                job.goal = goal;
                job.state = state;
                job.env = record.env;
                job.start_env = record.start_env;
                job.stop_env = record.stop_env;
                job.stop_on = record.stop_on;
                job.fds = record.fds;
                job.pids = pids;
                job.blocker = record.blocker;
                job.blocking = record.blocking;
                job.failure = record.failure;
                job.kill_timer_due = record.kill_timer_due;
                job.respawn_time = record.respawn_time;
                job.respawn_count = record.respawn_count;

                class.instances.insert(record.name, record.id);
                engine.jobs.insert(record.id, job);
            }

            engine.classes.insert(class.name.clone(), class);
        }

        // Every job link on an event must point at a live job, and every
        // event's blocker count must equal the job-held links against it.
        for (id, event) in &engine.events {
            for link in &event.blocking {
                if let Blocked::Job { job } = link {
                    if !engine.jobs.contains_key(job) {
                        return Err(StateError::DanglingJob(*job));
                    }
                }
            }
            let expected = expected_blockers.get(id).copied().unwrap_or(0);
            if event.blockers != expected {
                return Err(StateError::BlockerMismatch(*id));
            }
        }

        engine.set_next_ids(doc.next_event_id, doc.next_job_id, doc.next_session_id);
        Ok(engine)
    }
}

#[cfg(test)]
#[path = "../engine_tests/serial.rs"]
mod tests;
