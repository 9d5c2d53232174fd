// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job state machine: the pure next-state function, the imperative
//! `change_state` loop, and the entry actions that spawn and signal
//! processes, emit lifecycle events, and release the links of waiting
//! callers.

use super::{instance_path, Engine, ReplyBody};
use crate::blocking::{Blocked, MethodKind};
use crate::class::Expect;
use crate::clock::Clock;
use crate::env::EnvTable;
use crate::error::ControlError;
use crate::id::{EventId, JobId};
use crate::job::{Failure, Goal, ProcessRole, State};
use crate::process::{signal_name, KillSignal, ProcessOps, SpawnSpec};
use tracing::{info, warn};

/// Events emitted by the state machine.
pub const JOB_STARTING_EVENT: &str = "starting";
pub const JOB_STARTED_EVENT: &str = "started";
pub const JOB_STOPPING_EVENT: &str = "stopping";
pub const JOB_STOPPED_EVENT: &str = "stopped";

/// The next state a job should move into, given where it is and where it
/// is headed.
///
/// Pure: equal inputs always give equal outputs. `Respawn` behaves as
/// `Start` here; [`Engine::change_state`] collapses it (via
/// `advance_target`) at `PostStart`/`PreStop` before consulting the table.
pub fn next_state(state: State, goal: Goal, main_alive: bool) -> State {
    let starting = !matches!(goal, Goal::Stop);

    match state {
        State::Waiting => {
            assert!(starting, "waiting job asked for the next state towards stop");
            State::Starting
        }
        State::Starting => {
            if starting {
                State::PreStart
            } else {
                State::Stopping
            }
        }
        State::PreStart => {
            if starting {
                State::Spawned
            } else {
                State::Stopping
            }
        }
        State::Spawned => {
            if starting {
                State::PostStart
            } else {
                State::Stopping
            }
        }
        State::PostStart => {
            if starting {
                State::Running
            } else {
                State::Stopping
            }
        }
        State::Running => {
            if starting {
                // The main process is gone; go back around.
                State::Stopping
            } else if main_alive {
                State::PreStop
            } else {
                State::Stopping
            }
        }
        State::PreStop => {
            if starting {
                State::Running
            } else {
                State::Stopping
            }
        }
        State::Stopping => State::Killed,
        State::Killed => State::PostStop,
        State::PostStop => {
            if starting {
                State::Starting
            } else {
                State::Waiting
            }
        }
    }
}

/// What an entry action asks the `change_state` loop to do next.
enum Enter {
    /// The state is pending an event or a process; stop looping.
    Stay,
    /// Nothing to wait for; recompute the target and keep going.
    Advance,
    /// The job (and possibly its class) was destroyed.
    Done,
}

/// Result of trying to run one process role.
enum Spawn {
    NotDefined,
    Running,
    Failed,
}

impl<P: ProcessOps, C: Clock> Engine<P, C> {
    /// Change the goal of a job, inducing state movement from the rest
    /// states (`Waiting` towards start, `Running` towards stop). In any
    /// other state only the goal changes; the in-progress transition picks
    /// it up when it completes.
    pub fn change_goal(&mut self, id: JobId, goal: Goal) {
        let (old, state) = {
            let job = self.job(id);
            (job.goal, job.state)
        };
        if old == goal {
            return;
        }

        info!("{} goal changed from {} to {}", self.job_label(id), old, goal);
        self.job_mut(id).goal = goal;

        match goal {
            Goal::Start if state == State::Waiting => {
                let target = self.advance_target(id);
                self.change_state(id, target);
            }
            Goal::Stop if state == State::Running => {
                let target = self.advance_target(id);
                self.change_state(id, target);
            }
            _ => {}
        }
    }

    /// Drive a job towards `target`, one state at a time, running each
    /// entry action. Entry actions may re-aim the loop (a spawn failure
    /// turns the job around), park it pending an event or process exit, or
    /// destroy the job outright.
    pub(crate) fn change_state(&mut self, id: JobId, mut target: State) {
        while self.job(id).state != target {
            let label = self.job_label(id);
            let job = self.job_mut(id);
            assert!(job.blocker.is_none(), "state change for {label} while blocked on an event");

            let old = job.state;
            job.state = target;
            info!("{label} state changed from {old} to {target}");

            match self.enter_state(id, old) {
                Enter::Stay => {}
                Enter::Advance => target = self.advance_target(id),
                Enter::Done => return,
            }
        }
    }

    /// The target for the next single step, collapsing a `Respawn` goal
    /// back to `Start` where the table allows it.
    pub(crate) fn advance_target(&mut self, id: JobId) -> State {
        let main_alive = self.main_alive(id);
        let job = self.job_mut(id);

        if job.goal == Goal::Respawn
            && matches!(job.state, State::PostStart | State::PreStop)
        {
            job.goal = Goal::Start;
            return State::Stopping;
        }

        next_state(job.state, job.goal, main_alive)
    }

    fn main_alive(&self, id: JobId) -> bool {
        let job = self.job(id);
        let has_main = self
            .classes
            .get(&job.class)
            .is_some_and(|c| c.has_process(ProcessRole::Main));
        has_main && job.pids.get(ProcessRole::Main).is_some()
    }

    fn enter_state(&mut self, id: JobId, old: State) -> Enter {
        let state = self.job(id).state;
        match state {
            State::Starting => {
                {
                    let job = self.job_mut(id);
                    assert_eq!(job.goal, Goal::Start);
                    assert!(matches!(old, State::Waiting | State::PostStop));

                    // From here the newly set environment is the
                    // environment; keep the old one only if none was set.
                    if let Some(start_env) = job.start_env.take() {
                        job.env = start_env;
                    }
                    job.stop_env = None;
                    job.failure = None;
                }

                let event = self.emit_job_event(id, state);
                self.job_mut(id).blocker = Some(event);
                Enter::Stay
            }

            State::PreStart => {
                assert_eq!(self.job(id).goal, Goal::Start);
                assert_eq!(old, State::Starting);

                match self.spawn_role(id, ProcessRole::PreStart) {
                    Spawn::NotDefined => Enter::Advance,
                    Spawn::Running => Enter::Stay,
                    Spawn::Failed => {
                        self.job_failed(id, Some(ProcessRole::PreStart), -1);
                        self.change_goal(id, Goal::Stop);
                        Enter::Advance
                    }
                }
            }

            State::Spawned => {
                assert_eq!(self.job(id).goal, Goal::Start);
                assert_eq!(old, State::PreStart);

                match self.spawn_role(id, ProcessRole::Main) {
                    Spawn::NotDefined => Enter::Advance,
                    Spawn::Running => {
                        let expect = self
                            .classes
                            .get(&self.job(id).class)
                            .map(|c| c.expect)
                            .unwrap_or_default();
                        if expect == Expect::None {
                            Enter::Advance
                        } else {
                            // Parked until the trace collaborator reports
                            // the expectation met.
                            Enter::Stay
                        }
                    }
                    Spawn::Failed => {
                        self.job_failed(id, Some(ProcessRole::Main), -1);
                        self.change_goal(id, Goal::Stop);
                        Enter::Advance
                    }
                }
            }

            State::PostStart => {
                assert_eq!(self.job(id).goal, Goal::Start);
                assert_eq!(old, State::Spawned);

                match self.spawn_role(id, ProcessRole::PostStart) {
                    Spawn::NotDefined | Spawn::Failed => Enter::Advance,
                    Spawn::Running => Enter::Stay,
                }
            }

            State::Running => {
                assert_eq!(self.job(id).goal, Goal::Start);
                assert!(matches!(old, State::PostStart | State::PreStop));

                if old == State::PreStop {
                    // A stop attempt was cancelled mid pre-stop; callers
                    // waiting on the stop learn it completed (by not
                    // happening).
                    self.job_mut(id).stop_env = None;
                    self.job_finished(id, false);
                } else {
                    self.emit_job_event(id, state);

                    let task = self
                        .classes
                        .get(&self.job(id).class)
                        .is_some_and(|c| c.task);
                    if !task {
                        // A service has arrived; release start waiters.
                        self.job_finished(id, false);
                    }
                }
                Enter::Stay
            }

            State::PreStop => {
                assert_eq!(self.job(id).goal, Goal::Stop);
                assert_eq!(old, State::Running);

                match self.spawn_role(id, ProcessRole::PreStop) {
                    Spawn::NotDefined | Spawn::Failed => Enter::Advance,
                    Spawn::Running => Enter::Stay,
                }
            }

            State::Stopping => {
                assert!(matches!(
                    old,
                    State::Starting
                        | State::PreStart
                        | State::Spawned
                        | State::PostStart
                        | State::Running
                        | State::PreStop
                ));

                let event = self.emit_job_event(id, state);
                self.job_mut(id).blocker = Some(event);
                Enter::Stay
            }

            State::Killed => {
                assert_eq!(old, State::Stopping);

                if self.main_alive(id) {
                    let label = self.job_label(id);
                    let (pid, timeout_secs) = {
                        let job = self.job(id);
                        let timeout = self
                            .classes
                            .get(&job.class)
                            .map(|c| c.kill_timeout_secs)
                            .unwrap_or(crate::class::DEFAULT_KILL_TIMEOUT_SECS);
                        (self.job(id).pids.get(ProcessRole::Main), timeout)
                    };
                    if let Some(pid) = pid {
                        info!("sending TERM signal to {label} main process ({pid})");
                        self.procs.kill(pid, KillSignal::Term);
                        self.job_mut(id).kill_timer_due =
                            Some(self.clock.epoch_ms() + timeout_secs * 1000);
                    }
                    Enter::Stay
                } else {
                    Enter::Advance
                }
            }

            State::PostStop => {
                assert_eq!(old, State::Killed);

                match self.spawn_role(id, ProcessRole::PostStop) {
                    Spawn::NotDefined => Enter::Advance,
                    Spawn::Running => Enter::Stay,
                    Spawn::Failed => {
                        self.job_failed(id, Some(ProcessRole::PostStop), -1);
                        self.change_goal(id, Goal::Stop);
                        Enter::Advance
                    }
                }
            }

            State::Waiting => {
                assert_eq!(self.job(id).goal, Goal::Stop);
                assert!(matches!(old, State::PostStop | State::Starting));

                self.emit_job_event(id, state);
                self.job_finished(id, false);
                self.destroy_job(id);
                Enter::Done
            }
        }
    }

    /// Run one of the job's processes, if the class defines it.
    fn spawn_role(&mut self, id: JobId, role: ProcessRole) -> Spawn {
        let (process, class_name, instance, env, fds) = {
            let job = self.job(id);
            let Some(class) = self.classes.get(&job.class) else {
                return Spawn::NotDefined;
            };
            match class.process(role) {
                None => return Spawn::NotDefined,
                Some(spec) => (
                    spec.clone(),
                    job.class.clone(),
                    job.name.clone(),
                    job.env.clone(),
                    job.fds.clone(),
                ),
            }
        };

        let spec = SpawnSpec {
            class: &class_name,
            instance: &instance,
            role,
            process: &process,
            env: &env,
            fds: &fds,
        };
        match self.procs.spawn(spec) {
            Ok(pid) => {
                info!("{} {role} process started ({pid})", self.job_label(id));
                self.job_mut(id).pids.set(role, pid);
                Spawn::Running
            }
            Err(err) => {
                warn!("{} {err}", self.job_label(id));
                Spawn::Failed
            }
        }
    }

    /// Mark a job as failed, once, releasing everything blocked on it with
    /// the failure.
    pub(crate) fn job_failed(&mut self, id: JobId, process: Option<ProcessRole>, status: i32) {
        {
            let job = self.job_mut(id);
            if job.failure.is_some() {
                return;
            }
            job.failure = Some(Failure { process, status });
        }
        self.job_finished(id, true);
    }

    /// Release every link on the job's blocking list: events it was
    /// blocking get unblocked (and marked failed when the job failed),
    /// waiting method calls get their reply.
    pub(crate) fn job_finished(&mut self, id: JobId, failed: bool) {
        let (links, path) = {
            let job = self.job_mut(id);
            let links = std::mem::take(&mut job.blocking);
            (links, instance_path(&job.class, &job.name))
        };

        for link in links {
            match link {
                Blocked::Event { event } => {
                    if failed {
                        if let Some(e) = self.events.get_mut(&event) {
                            e.failed = true;
                        }
                    }
                    self.event_unblock(event);
                }
                Blocked::Method { ticket, kind } => {
                    let result = if failed {
                        Err(ControlError::JobFailed)
                    } else {
                        match kind {
                            MethodKind::Start | MethodKind::Restart => {
                                Ok(ReplyBody::Path(path.clone()))
                            }
                            MethodKind::Stop => Ok(ReplyBody::Done),
                            MethodKind::EmitEvent => {
                                unreachable!("emit-event reply blocked on a job")
                            }
                        }
                    };
                    self.push_reply(ticket, result);
                }
                Blocked::Job { .. } => unreachable!("job link on a job's blocking list"),
            }
        }
    }

    /// Construct and queue the lifecycle event for the state being
    /// entered. Starting and stopping events block on the job: the event's
    /// blocking list gets a job link and the job's `blocker` is set by the
    /// caller.
    pub(crate) fn emit_job_event(&mut self, id: JobId, state: State) -> EventId {
        let (name, block, stop) = match state {
            State::Starting => (JOB_STARTING_EVENT, true, false),
            State::Running => (JOB_STARTED_EVENT, false, false),
            State::Stopping => (JOB_STOPPING_EVENT, true, true),
            State::Waiting => (JOB_STOPPED_EVENT, false, true),
            _ => unreachable!("no lifecycle event for {state}"),
        };

        let (env, session) = {
            let job = self.job(id);
            let mut env = EnvTable::new();
            env.set("JOB", &job.class);
            env.set("INSTANCE", &job.name);

            if stop {
                match job.failure {
                    Some(Failure { process, status }) => {
                        env.set("RESULT", "failed");
                        match process {
                            Some(role) if status != -1 => {
                                env.set("PROCESS", &role.to_string());
                                // A signal termination lives in the high
                                // byte; a plain exit code in the low one.
                                if (status & !0xff) != 0 {
                                    let signum = status >> 8;
                                    match signal_name(signum) {
                                        Some(name) => env.set("EXIT_SIGNAL", name),
                                        None => env.set("EXIT_SIGNAL", &signum.to_string()),
                                    }
                                } else {
                                    env.set("EXIT_STATUS", &status.to_string());
                                }
                            }
                            Some(role) => {
                                env.set("PROCESS", &role.to_string());
                            }
                            None => {
                                env.set("PROCESS", "respawn");
                            }
                        }
                    }
                    None => env.set("RESULT", "ok"),
                }
            }

            if let Some(class) = self.classes.get(&job.class) {
                for key in &class.export {
                    if let Some(entry) = job.env.entry(key) {
                        env.push_entry(entry);
                    }
                }
            }

            (env, job.session)
        };

        let failed = stop && self.job(id).failed();
        let event = self.emit_event(name, env, session);
        if let Some(e) = self.events.get_mut(&event) {
            // A failed job's stop events finish failed themselves, so the
            // failure fans out as `stopping/failed` and `stopped/failed`.
            e.failed = failed;
            if block {
                e.blocking.push(Blocked::Job { job: id });
            }
        }
        event
    }

    /// Remove a job that reached `Waiting`, destroying its class with it
    /// when the class is a drained tombstone.
    fn destroy_job(&mut self, id: JobId) {
        let label = self.job_label(id);
        let Some(job) = self.jobs.shift_remove(&id) else { return };

        if let Some(class) = self.classes.get_mut(job.class.as_str()) {
            class.instances.shift_remove(&job.name);
            if class.deleted && class.instances.is_empty() {
                info!("destroyed unused job {}", job.class);
                self.classes.shift_remove(job.class.as_str());
                return;
            }
        }
        info!("destroyed inactive instance {label}");
    }
}

