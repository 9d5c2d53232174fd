// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reactions to child-process exits: script progression, main-process
//! failure and respawn policy, and TERM-to-KILL escalation.

use super::Engine;
use crate::clock::Clock;
use crate::id::JobId;
use crate::job::{Goal, ProcessRole, State};
use crate::process::{KillSignal, ProcessOps};
use tracing::{debug, info, warn};

impl<P: ProcessOps, C: Clock> Engine<P, C> {
    /// Handle the exit of a managed child.
    ///
    /// `status` uses the wait convention: low byte is the exit code, a
    /// terminating signal is stored shifted left by eight.
    pub fn child_exited(&mut self, pid: u32, status: i32) {
        let found = self
            .jobs
            .iter()
            .find_map(|(id, job)| job.pids.role_of(pid).map(|role| (*id, role)));
        let Some((id, role)) = found else {
            debug!("exit of unknown child {pid}, ignored");
            return;
        };

        self.job_mut(id).pids.clear(role);
        info!(
            "{} {role} process ({pid}) {}",
            self.job_label(id),
            describe_status(status)
        );

        match role {
            ProcessRole::Main => self.main_exited(id, status),

            ProcessRole::PreStart => {
                if self.job(id).state != State::PreStart {
                    return;
                }
                if status != 0 {
                    self.job_failed(id, Some(ProcessRole::PreStart), status);
                    self.change_goal(id, Goal::Stop);
                }
                self.advance_if_rested(id, State::PreStart);
            }

            ProcessRole::PostStart => {
                if self.job(id).state != State::PostStart {
                    return;
                }
                // Post-start failure is non-fatal; the service is up.
                self.advance_if_rested(id, State::PostStart);
            }

            ProcessRole::PreStop => {
                if self.job(id).state != State::PreStop {
                    return;
                }
                self.advance_if_rested(id, State::PreStop);
            }

            ProcessRole::PostStop => {
                if self.job(id).state != State::PostStop {
                    return;
                }
                if status != 0 {
                    self.job_failed(id, Some(ProcessRole::PostStop), status);
                    self.change_goal(id, Goal::Stop);
                }
                self.advance_if_rested(id, State::PostStop);
            }
        }
    }

    fn main_exited(&mut self, id: JobId, status: i32) {
        self.job_mut(id).kill_timer_due = None;

        let state = self.job(id).state;
        let goal = self.job(id).goal;

        // While a post-start or pre-stop script still runs, the state
        // holds until that script finishes; the stopping state holds for
        // its event.
        let advance = match state {
            State::PostStart => self.job(id).pids.get(ProcessRole::PostStart).is_none(),
            State::PreStop => self.job(id).pids.get(ProcessRole::PreStop).is_none(),
            State::Stopping => false,
            _ => true,
        };

        // A death we caused (or one during the stop chain) is never a
        // failure and never respawns.
        if !matches!(state, State::Stopping | State::Killed) && goal == Goal::Start {
            let (respawn, limit, interval_secs, normal) = {
                let job = self.job(id);
                let class = self.classes.get(&job.class);
                (
                    class.is_some_and(|c| c.respawn),
                    class.map(|c| c.respawn_limit.count).unwrap_or_default(),
                    class.map(|c| c.respawn_limit.interval_secs).unwrap_or_default(),
                    class.is_some_and(|c| c.exit_is_normal(status)),
                )
            };

            let respawnable =
                respawn && matches!(state, State::Running | State::PostStart | State::PreStop);

            if respawnable && !normal {
                let now_secs = self.clock.epoch_secs();
                if self.job_mut(id).respawn_exceeds_limit(now_secs, limit, interval_secs) {
                    warn!("{} respawning too fast, stopped", self.job_label(id));
                    self.job_failed(id, None, -1);
                    self.change_goal(id, Goal::Stop);
                } else {
                    warn!("{} main process ended, respawning", self.job_label(id));
                    if matches!(state, State::PostStart | State::PreStop) {
                        // A script is still running; remember the respawn
                        // and let the table collapse it when the script
                        // finishes.
                        self.change_goal(id, Goal::Respawn);
                    }
                    // From running, the goal stays start and the stop
                    // chain cycles back into starting on its own.
                }
            } else {
                if !normal {
                    self.job_failed(id, Some(ProcessRole::Main), status);
                }
                self.change_goal(id, Goal::Stop);
            }
        }

        if advance {
            self.advance_if_rested(id, state);
        }
    }

    /// Advance one step, unless a goal change already moved the job or it
    /// is pending an event.
    fn advance_if_rested(&mut self, id: JobId, observed: State) {
        let Some(job) = self.jobs.get(&id) else { return };
        if job.blocker.is_some() || job.state != observed {
            return;
        }
        let target = self.advance_target(id);
        self.change_state(id, target);
    }

    /// The trace collaborator reports a parked `Spawned` job as ready
    /// (forked, daemonized, or raised SIGSTOP, per the class's expect
    /// mode).
    pub fn expect_met(&mut self, id: JobId) {
        let Some(job) = self.jobs.get(&id) else { return };
        if job.state != State::Spawned || job.blocker.is_some() {
            return;
        }
        let target = self.advance_target(id);
        self.change_state(id, target);
    }

    /// Fire expired kill timers, escalating TERM to KILL.
    pub fn tick(&mut self) {
        let now = self.clock.epoch_ms();
        let due: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.kill_timer_due.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            self.job_mut(id).kill_timer_due = None;
            if let Some(pid) = self.job(id).pids.get(ProcessRole::Main) {
                warn!(
                    "{} main process ({pid}) ignored TERM, sending KILL",
                    self.job_label(id)
                );
                self.procs.kill(pid, KillSignal::Kill);
            }
        }
    }

    /// Epoch-ms instant of the nearest kill-timer deadline, for the main
    /// loop's sleep.
    pub fn next_deadline(&self) -> Option<u64> {
        self.jobs.values().filter_map(|job| job.kill_timer_due).min()
    }
}

fn describe_status(status: i32) -> String {
    if (status & !0xff) != 0 {
        format!("killed by signal {}", status >> 8)
    } else if status != 0 {
        format!("terminated with status {status}")
    } else {
        "exited normally".to_string()
    }
}
