// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three-phase event queue: `poll`, the job-match dispatch pass, and
//! event finalization.

use super::{Engine, ReplyBody};
use crate::blocking::{Blocked, MethodKind};
use crate::clock::Clock;
use crate::env::EnvTable;
use crate::error::ControlError;
use crate::event::Progress;
use crate::id::{EventId, JobId};
use crate::job::Goal;
use crate::process::ProcessOps;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

/// Env variable naming the events that started a job.
pub const START_EVENTS_VAR: &str = "STOKER_EVENTS";
/// Env variable naming the events that stopped a job.
pub const STOP_EVENTS_VAR: &str = "STOKER_STOP_EVENTS";
/// Env variable listing descriptors collected from fd-bearing events.
pub const FDS_VAR: &str = "STOKER_FDS";

impl<P: ProcessOps, C: Clock> Engine<P, C> {
    /// Drain the event queue.
    ///
    /// Pending events move to handling and are dispatched against the job
    /// registry; handling events with no remaining blockers finish, and
    /// finished events release their blocking lists and are destroyed. An
    /// event can traverse all three phases in a single visit when nothing
    /// blocks it, and anything enqueued mid-poll is processed before
    /// returning. On return every surviving event is handling with
    /// blockers outstanding.
    pub fn poll(&mut self) {
        loop {
            let mut progressed = false;

            let snapshot: Vec<EventId> = self.events.keys().copied().collect();
            for id in snapshot {
                let Some(event) = self.events.get_mut(&id) else {
                    continue;
                };

                match event.progress {
                    Progress::Pending => {
                        info!("handling {} event", event.name);
                        event.progress = Progress::Handling;
                        self.dispatch(id);
                        progressed = true;

                        // Straight through to finished when nothing blocked it.
                        if let Some(event) = self.events.get_mut(&id) {
                            if event.blockers == 0 {
                                event.progress = Progress::Finished;
                                self.finalize(id);
                            }
                        }
                    }
                    Progress::Handling => {
                        if event.blockers == 0 {
                            event.progress = Progress::Finished;
                            self.finalize(id);
                            progressed = true;
                        }
                    }
                    Progress::Finished => {
                        self.finalize(id);
                        progressed = true;
                    }
                }
            }

            if !progressed {
                break;
            }
        }
    }

    /// Offer a handling event to every class in the registry.
    ///
    /// Stops run before starts so an event listed on both sides of a job
    /// kills the running process first and triggers a fresh start after,
    /// never the reverse.
    fn dispatch(&mut self, id: EventId) {
        let (name, env, session, fd) = {
            let Some(event) = self.events.get(&id) else { return };
            (event.name.clone(), event.env.clone(), event.session, event.fd)
        };

        let class_names: Vec<SmolStr> = self.classes.keys().cloned().collect();
        for class_name in class_names {
            let Some(class) = self.classes.get(&class_name) else { continue };
            // A scoped event only touches its own session's classes; a
            // global event touches everything.
            if session.is_some() && class.session != session {
                continue;
            }

            self.dispatch_stop_pass(&class_name, id, &name, &env);
            self.dispatch_start_pass(&class_name, id, &name, &env, fd);
        }
    }

    fn dispatch_stop_pass(
        &mut self,
        class_name: &SmolStr,
        id: EventId,
        name: &str,
        env: &EnvTable,
    ) {
        let instances: Vec<JobId> = match self.classes.get(class_name) {
            Some(class) => class.instances.values().copied().collect(),
            None => return,
        };

        for job_id in instances {
            // Decide with the job borrowed, act once it's released.
            let triggered = {
                let Some(job) = self.jobs.get_mut(&job_id) else { continue };
                let job_env = &job.env;
                let Some(stop_on) = job.stop_on.as_mut() else { continue };

                if stop_on.handle(id, name, env, None, Some(job_env)) && stop_on.value() {
                    let triggered = if job.goal == Goal::Stop {
                        None
                    } else {
                        // The pre-stop script gets what stopped the job,
                        // appended to the existing job environment; class
                        // defaults are not repeated.
                        let mut stop_env = EnvTable::new();
                        stop_on.environment(&mut stop_env, STOP_EVENTS_VAR);
                        let captured: Vec<EventId> =
                            stop_on.captures().iter().map(|(_, c)| c.event).collect();
                        Some((stop_env, captured))
                    };
                    stop_on.reset();
                    triggered
                } else {
                    None
                }
            };

            let Some((stop_env, captured)) = triggered else { continue };

            self.job_mut(job_id).stop_env = Some(stop_env);
            self.job_finished(job_id, false);
            for event in captured {
                self.event_block(event);
                self.job_mut(job_id).blocking.push(Blocked::Event { event });
            }
            self.change_goal(job_id, Goal::Stop);
        }
    }

    fn dispatch_start_pass(
        &mut self,
        class_name: &SmolStr,
        id: EventId,
        name: &str,
        env: &EnvTable,
        fd: Option<i32>,
    ) {
        let triggered = {
            let Some(class) = self.classes.get_mut(class_name) else { return };
            // Tombstones drain; they do not grow new instances.
            if class.deleted {
                return;
            }
            let Some(start_on) = class.start_on.as_mut() else { return };

            if start_on.handle(id, name, env, fd, None) && start_on.value() {
                // Instance environment: class defaults plus what the
                // expression captured.
                let mut start_env = class.env.clone();
                start_on.environment(&mut start_env, START_EVENTS_VAR);

                let captured: Vec<(EventId, Option<i32>)> =
                    start_on.captures().iter().map(|(_, c)| (c.event, c.fd)).collect();
                let instance_template = class.instance.clone();
                start_on.reset();
                Some((start_env, captured, instance_template))
            } else {
                None
            }
        };

        let Some((mut start_env, captured, instance_template)) = triggered else {
            return;
        };

        let instance_name = match start_env.expand(&instance_template) {
            Ok(name) => name,
            Err(err) => {
                warn!("failed to obtain {class_name} instance: {err}");
                return;
            }
        };

        let job_id = match self
            .classes
            .get(class_name)
            .and_then(|c| c.instances.get(&instance_name))
        {
            Some(id) => *id,
            None => self.new_job(class_name, &instance_name),
        };
        debug!("new instance {}", self.job_label(job_id));

        if self.job(job_id).goal == Goal::Start {
            return;
        }

        // Pass descriptors from fd-bearing events through to the job.
        let fds: Vec<i32> = captured.iter().filter_map(|(_, fd)| *fd).collect();
        if !fds.is_empty() {
            let listing = fds.iter().map(i32::to_string).collect::<Vec<_>>().join(" ");
            start_env.set(FDS_VAR, &listing);
        }

        {
            let job = self.job_mut(job_id);
            job.start_env = Some(start_env);
            job.fds = fds;
        }

        self.job_finished(job_id, false);
        for (event, _) in captured {
            self.event_block(event);
            self.job_mut(job_id).blocking.push(Blocked::Event { event });
        }
        self.change_goal(job_id, Goal::Start);
    }

    /// Release a finished event: unblock what it was holding, queue the
    /// `/failed` follow-on when it failed, and destroy it.
    pub(crate) fn finalize(&mut self, id: EventId) {
        let Some(mut event) = self.events.shift_remove(&id) else { return };
        debug!("finished {} event", event.name);

        for link in std::mem::take(&mut event.blocking) {
            match link {
                Blocked::Job { job } => {
                    let Some(j) = self.jobs.get_mut(&job) else {
                        debug_assert!(false, "finished event blocking a destroyed job");
                        continue;
                    };
                    j.blocker = None;
                    let target = self.advance_target(job);
                    self.change_state(job, target);
                }
                Blocked::Method { ticket, kind } => {
                    debug_assert!(matches!(kind, MethodKind::EmitEvent));
                    let result = if event.failed {
                        Err(ControlError::EventFailed)
                    } else {
                        Ok(ReplyBody::Done)
                    };
                    self.push_reply(ticket, result);
                }
                Blocked::Event { .. } => {
                    unreachable!("event link on an event's blocking list")
                }
            }
        }

        if event.wants_failed_follow_on() {
            let name = format!("{}{}", event.name, crate::event::FAILED_SUFFIX);
            self.emit_event(name, event.env.clone(), event.session);
        }
    }
}
