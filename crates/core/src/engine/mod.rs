// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision engine.
//!
//! One `Engine` owns the event queue, the class registry, the job arena,
//! and the session table. All mutation happens through it, on whatever
//! thread drives it; there is no interior locking. The daemon pumps it
//! from the main loop, tests construct one directly.

pub mod child;
pub mod machine;
pub mod queue;
pub mod serial;

use crate::blocking::{Blocked, MethodKind};
use crate::class::JobClass;
use crate::clock::Clock;
use crate::env::EnvTable;
use crate::error::ControlError;
use crate::event::Event;
use crate::id::{EventId, JobId, SessionId, Ticket};
use crate::job::{Goal, Job, State};
use crate::process::ProcessOps;
use crate::session::Session;
use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

/// Payload of a successful control reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Done,
    Path(String),
}

/// A completed deferred reply, drained by the control endpoint after poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub ticket: Ticket,
    pub result: Result<ReplyBody, ControlError>,
}

/// How a control operation concluded: an immediate reply, or deferred
/// until the job or event it touched completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Replied(ReplyBody),
    Deferred,
}

/// Properties of one instance, for the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub name: String,
    pub goal: String,
    pub state: String,
    /// `(role name, pid)` for every live process.
    pub processes: Vec<(String, u32)>,
}

/// The event-driven supervision engine.
pub struct Engine<P, C> {
    pub(crate) procs: P,
    pub(crate) clock: C,
    pub(crate) events: IndexMap<EventId, Event>,
    next_event: u64,
    pub(crate) jobs: IndexMap<JobId, Job>,
    next_job: u64,
    pub(crate) classes: IndexMap<SmolStr, JobClass>,
    pub(crate) sessions: IndexMap<SessionId, Session>,
    next_session: u64,
    outbox: Vec<Reply>,
    /// Every event queued, in order, for test assertions on sequences.
    #[cfg(any(test, feature = "test-support"))]
    pub event_log: Vec<(SmolStr, EnvTable)>,
}

impl<P: ProcessOps, C: Clock> Engine<P, C> {
    pub fn new(procs: P, clock: C) -> Self {
        Self {
            procs,
            clock,
            events: IndexMap::new(),
            next_event: 1,
            jobs: IndexMap::new(),
            next_job: 1,
            classes: IndexMap::new(),
            sessions: IndexMap::new(),
            next_session: 1,
            outbox: Vec::new(),
            #[cfg(any(test, feature = "test-support"))]
            event_log: Vec::new(),
        }
    }

    // ---- event queue primitives ----

    /// Append a new pending event at the tail of the queue.
    pub fn emit_event(
        &mut self,
        name: impl Into<SmolStr>,
        env: EnvTable,
        session: Option<SessionId>,
    ) -> EventId {
        let event = Event::new(name, env, session);
        let id = EventId::from_u64(self.next_event);
        self.next_event += 1;

        debug!(event = %event.name, id = %id, "pending event");
        #[cfg(any(test, feature = "test-support"))]
        self.event_log.push((event.name.clone(), event.env.clone()));
        self.events.insert(id, event);
        id
    }

    pub(crate) fn event_block(&mut self, id: EventId) {
        if let Some(event) = self.events.get_mut(&id) {
            event.blockers += 1;
        }
    }

    pub(crate) fn event_unblock(&mut self, id: EventId) {
        if let Some(event) = self.events.get_mut(&id) {
            assert!(event.blockers > 0, "unblock of event {id} with no blockers");
            event.blockers -= 1;
        }
    }

    /// Number of events still in the queue.
    pub fn queue_len(&self) -> usize {
        self.events.len()
    }

    // ---- registry ----

    /// Register or replace a class definition.
    ///
    /// Replacing keeps existing instances attached to the new definition;
    /// their per-job `stop_on` copies are unaffected.
    pub fn register_class(&mut self, mut class: JobClass) {
        if let Some(old) = self.classes.get(&class.name) {
            class.instances = old.instances.clone();
        }
        debug!(class = %class.name, "registered class");
        self.classes.insert(class.name.clone(), class);
    }

    /// Remove a class definition. With live instances it becomes a
    /// tombstone destroyed when the last instance reaches `Waiting`.
    pub fn remove_class(&mut self, name: &str) {
        let Some(class) = self.classes.get_mut(name) else { return };
        if class.instances.is_empty() {
            debug!(class = name, "removed class");
            self.classes.shift_remove(name);
        } else {
            debug!(class = name, "marked class deleted");
            class.deleted = true;
        }
    }

    pub fn class(&self, name: &str) -> Option<&JobClass> {
        self.classes.get(name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(SmolStr::as_str)
    }

    // ---- sessions ----

    pub fn register_session(&mut self, session: Session) -> SessionId {
        let id = SessionId::from_u64(self.next_session);
        self.next_session += 1;
        self.sessions.insert(id, session);
        id
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// All registered sessions, in registration order.
    pub fn sessions(&self) -> impl Iterator<Item = (SessionId, &Session)> {
        self.sessions.iter().map(|(id, session)| (*id, session))
    }

    // ---- control operations ----

    /// `Start(name, env, wait)`: create or reuse an instance and set its
    /// goal to `Start`.
    pub fn start_job(
        &mut self,
        class_name: &str,
        request_env: &[String],
        wait: Option<Ticket>,
        session: Option<SessionId>,
    ) -> Result<Outcome, ControlError> {
        let class = self
            .classes
            .get(class_name)
            .filter(|c| !c.deleted)
            .ok_or(ControlError::UnknownJob)?;
        if class.session != session {
            return Err(ControlError::PermissionDenied);
        }

        let mut env = class.env.clone();
        env.merge(&EnvTable::from_entries(request_env.iter().cloned()));
        let instance_name =
            env.expand(&class.instance).map_err(|_| ControlError::InvalidArgument)?;

        let id = match class.instances.get(&instance_name) {
            Some(id) => *id,
            None => self.new_job(class_name, &instance_name),
        };

        {
            let job = self.job_mut(id);
            if job.goal == Goal::Start {
                return Err(ControlError::AlreadyStarted);
            }
            job.start_env = Some(env);
        }

        self.job_finished(id, false);
        if let Some(ticket) = wait {
            self.job_mut(id).blocking.push(Blocked::Method { ticket, kind: MethodKind::Start });
        }
        self.change_goal(id, Goal::Start);

        let path = instance_path(class_name, &instance_name);
        Ok(match wait {
            Some(_) => Outcome::Deferred,
            None => Outcome::Replied(ReplyBody::Path(path)),
        })
    }

    /// `Stop(path, env, wait)`: set the instance's goal to `Stop`.
    pub fn stop_job(
        &mut self,
        path: &str,
        request_env: &[String],
        wait: Option<Ticket>,
        session: Option<SessionId>,
    ) -> Result<Outcome, ControlError> {
        let id = self.resolve_instance(path, session)?;

        {
            let job = self.job_mut(id);
            if job.goal == Goal::Stop {
                return Err(ControlError::AlreadyStopped);
            }
            job.stop_env = if request_env.is_empty() {
                None
            } else {
                Some(EnvTable::from_entries(request_env.iter().cloned()))
            };
        }

        self.job_finished(id, false);
        if let Some(ticket) = wait {
            self.job_mut(id).blocking.push(Blocked::Method { ticket, kind: MethodKind::Stop });
        }
        self.change_goal(id, Goal::Stop);

        Ok(match wait {
            Some(_) => Outcome::Deferred,
            None => Outcome::Replied(ReplyBody::Done),
        })
    }

    /// `Restart(path, env, wait)`: goal to `Stop`, then immediately back to
    /// `Start`; the in-flight stop picks the new goal up on completion.
    pub fn restart_job(
        &mut self,
        path: &str,
        request_env: &[String],
        wait: Option<Ticket>,
        session: Option<SessionId>,
    ) -> Result<Outcome, ControlError> {
        let id = self.resolve_instance(path, session)?;

        {
            let job = self.job_mut(id);
            if job.goal == Goal::Stop {
                return Err(ControlError::AlreadyStopped);
            }
            job.start_env = if request_env.is_empty() {
                None
            } else {
                Some(EnvTable::from_entries(request_env.iter().cloned()))
            };
            job.stop_env = None;
        }

        self.job_finished(id, false);
        if let Some(ticket) = wait {
            self.job_mut(id).blocking.push(Blocked::Method { ticket, kind: MethodKind::Restart });
        }
        self.change_goal(id, Goal::Stop);
        self.change_goal(id, Goal::Start);

        let (class_name, instance_name) = {
            let job = self.job(id);
            (job.class.clone(), job.name.clone())
        };
        let path = instance_path(&class_name, &instance_name);
        Ok(match wait {
            Some(_) => Outcome::Deferred,
            None => Outcome::Replied(ReplyBody::Path(path)),
        })
    }

    /// `EmitEvent(name, env, wait)`: enqueue an event, optionally waiting
    /// for it to finish.
    pub fn emit_request(
        &mut self,
        name: &str,
        request_env: &[String],
        wait: Option<Ticket>,
        session: Option<SessionId>,
    ) -> Result<Outcome, ControlError> {
        if name.is_empty() {
            return Err(ControlError::InvalidArgument);
        }

        let env = EnvTable::from_entries(request_env.iter().cloned());
        let id = self.emit_event(name, env, session);

        match wait {
            Some(ticket) => {
                if let Some(event) = self.events.get_mut(&id) {
                    event.blocking.push(Blocked::Method { ticket, kind: MethodKind::EmitEvent });
                }
                Ok(Outcome::Deferred)
            }
            None => Ok(Outcome::Replied(ReplyBody::Done)),
        }
    }

    // ---- queries ----

    /// Paths of every class visible to the session.
    pub fn all_jobs(&self, session: Option<SessionId>) -> Vec<String> {
        self.classes
            .values()
            .filter(|c| !c.deleted && c.session == session)
            .map(|c| class_path(&c.name))
            .collect()
    }

    pub fn job_by_name(
        &self,
        name: &str,
        session: Option<SessionId>,
    ) -> Result<String, ControlError> {
        let class = self
            .classes
            .get(name)
            .filter(|c| !c.deleted)
            .ok_or(ControlError::UnknownJob)?;
        if class.session != session {
            return Err(ControlError::PermissionDenied);
        }
        Ok(class_path(&class.name))
    }

    /// Paths of every instance of the class at `path`.
    pub fn all_instances(
        &self,
        path: &str,
        session: Option<SessionId>,
    ) -> Result<Vec<String>, ControlError> {
        let class_name = parse_class_path(path).ok_or(ControlError::UnknownJob)?;
        let class = self.classes.get(class_name).ok_or(ControlError::UnknownJob)?;
        if class.session != session {
            return Err(ControlError::PermissionDenied);
        }
        Ok(class.instances.keys().map(|name| instance_path(class_name, name)).collect())
    }

    pub fn instance_by_name(
        &self,
        path: &str,
        name: &str,
        session: Option<SessionId>,
    ) -> Result<String, ControlError> {
        let class_name = parse_class_path(path).ok_or(ControlError::UnknownJob)?;
        let class = self.classes.get(class_name).ok_or(ControlError::UnknownJob)?;
        if class.session != session {
            return Err(ControlError::PermissionDenied);
        }
        if !class.instances.contains_key(name) {
            return Err(ControlError::UnknownInstance);
        }
        Ok(instance_path(class_name, name))
    }

    /// Properties of the instance at `path`.
    pub fn instance_info(
        &self,
        path: &str,
        session: Option<SessionId>,
    ) -> Result<InstanceInfo, ControlError> {
        let id = self.resolve_instance_ref(path, session)?;
        let job = self.job(id);
        Ok(InstanceInfo {
            name: job.name.clone(),
            goal: job.goal.to_string(),
            state: job.state.to_string(),
            processes: job
                .pids
                .live()
                .into_iter()
                .map(|(role, pid)| (role.to_string(), pid))
                .collect(),
        })
    }

    // ---- outbox ----

    pub(crate) fn push_reply(&mut self, ticket: Ticket, result: Result<ReplyBody, ControlError>) {
        self.outbox.push(Reply { ticket, result });
    }

    /// Drain completed deferred replies. The daemon calls this after every
    /// `poll`.
    pub fn take_replies(&mut self) -> Vec<Reply> {
        std::mem::take(&mut self.outbox)
    }

    // ---- internals shared by the submodules ----

    /// Create a fresh instance of a class, resting in `Waiting`.
    pub(crate) fn new_job(&mut self, class_name: &str, instance_name: &str) -> JobId {
        let class = match self.classes.get_mut(class_name) {
            Some(class) => class,
            None => unreachable!("instance of unregistered class {class_name}"),
        };

        let job = Job::new(
            class.name.clone(),
            instance_name,
            class.session,
            class.stop_on.clone(),
        );

        let id = JobId::from_u64(self.next_job);
        self.next_job += 1;

        class.instances.insert(instance_name.to_string(), id);
        debug!(class = class_name, instance = instance_name, id = %id, "new instance");
        self.jobs.insert(id, job);
        id
    }

    /// A job by handle. The handle must be live; the engine never hands
    /// out handles to destroyed jobs.
    pub(crate) fn job(&self, id: JobId) -> &Job {
        match self.jobs.get(&id) {
            Some(job) => job,
            None => unreachable!("stale job handle {id}"),
        }
    }

    pub(crate) fn job_mut(&mut self, id: JobId) -> &mut Job {
        match self.jobs.get_mut(&id) {
            Some(job) => job,
            None => unreachable!("stale job handle {id}"),
        }
    }

    /// Look up a live instance by ID, for tests and the trace collaborator.
    pub fn job_state(&self, id: JobId) -> Option<(Goal, State)> {
        self.jobs.get(&id).map(|j| (j.goal, j.state))
    }

    /// Resolve an instance path for a mutating request.
    fn resolve_instance(
        &mut self,
        path: &str,
        session: Option<SessionId>,
    ) -> Result<JobId, ControlError> {
        self.resolve_instance_ref(path, session)
    }

    fn resolve_instance_ref(
        &self,
        path: &str,
        session: Option<SessionId>,
    ) -> Result<JobId, ControlError> {
        let (class_name, instance_name) =
            parse_instance_path(path).ok_or(ControlError::UnknownInstance)?;
        let class = self.classes.get(class_name).ok_or(ControlError::UnknownJob)?;
        if class.session != session {
            return Err(ControlError::PermissionDenied);
        }
        class
            .instances
            .get(instance_name)
            .copied()
            .ok_or(ControlError::UnknownInstance)
    }

    pub(crate) fn next_event_id(&self) -> u64 {
        self.next_event
    }

    pub(crate) fn next_job_id(&self) -> u64 {
        self.next_job
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_session
    }

    /// Restore arena counters from a state document, never rewinding past
    /// the highest id actually in use.
    pub(crate) fn set_next_ids(&mut self, event: u64, job: u64, session: u64) {
        let max_event = self.events.keys().map(|id| id.as_u64()).max().unwrap_or(0);
        let max_job = self.jobs.keys().map(|id| id.as_u64()).max().unwrap_or(0);
        let max_session = self.sessions.keys().map(|id| id.as_u64()).max().unwrap_or(0);
        self.next_event = event.max(max_event + 1);
        self.next_job = job.max(max_job + 1);
        self.next_session = session.max(max_session + 1);
    }

    /// Display name used in log messages: class, plus instance in
    /// parentheses when named.
    pub(crate) fn job_label(&self, id: JobId) -> String {
        let job = self.job(id);
        if job.name.is_empty() {
            job.class.to_string()
        } else {
            format!("{} ({})", job.class, job.name)
        }
    }
}

/// Path of a job class on the control surface.
pub fn class_path(class: &str) -> String {
    format!("/jobs/{class}")
}

/// Path of one instance. The empty instance name renders as `_`.
pub fn instance_path(class: &str, instance: &str) -> String {
    if instance.is_empty() {
        format!("/jobs/{class}/_")
    } else {
        format!("/jobs/{class}/{instance}")
    }
}

fn parse_class_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/jobs/")?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

fn parse_instance_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix("/jobs/")?;
    let (class, instance) = rest.split_once('/')?;
    if class.is_empty() {
        return None;
    }
    Some((class, if instance == "_" { "" } else { instance }))
}

#[cfg(test)]
#[path = "../engine_tests/mod.rs"]
mod tests;
