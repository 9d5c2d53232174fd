// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon main loop.
//!
//! One task owns the engine and pumps everything that can mutate it:
//! control requests from the listener, child-exit notifications, signals,
//! and kill-timer deadlines. After every stimulus the event queue is
//! polled to quiescence and completed replies are delivered.

use crate::args::Args;
use crate::conf::SessionConf;
use crate::listener::ControlMsg;
use crate::procs::RealProcessOps;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use stoker_core::{
    Clock, ControlError, Engine, EnvTable, JobClass, Outcome, ReplyBody, Session, SessionId,
    SystemClock, Ticket,
};
use stoker_wire::{ProcessEntry, Request, Response};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// The engine as the daemon runs it.
pub type DaemonEngine = Engine<RealProcessOps, SystemClock>;

pub struct EngineLoop {
    engine: DaemonEngine,
    /// Taken by `run`; the loop polls it as a local so the handlers keep
    /// exclusive access to the rest of the state.
    control_rx: Option<mpsc::Receiver<ControlMsg>>,
    pending: HashMap<Ticket, oneshot::Sender<Response>>,
    next_ticket: u64,
    args: Args,
    /// Class names currently sourced from the configuration directory.
    conf_classes: HashSet<String>,
    /// Session ids by session-directory name, stable across reloads.
    session_dirs: HashMap<String, SessionId>,
    pid1: bool,
    shutdown: bool,
}

impl EngineLoop {
    pub fn new(engine: DaemonEngine, control_rx: mpsc::Receiver<ControlMsg>, args: Args) -> Self {
        let pid1 = nix::unistd::getpid().as_raw() == 1 && !args.session;

        // A restored engine already carries its sessions; key them back to
        // their directories so a reload reuses the ids.
        let mut session_dirs = HashMap::new();
        for (id, session) in engine.sessions() {
            let name = session
                .conf_path
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            if let Some(name) = name {
                session_dirs.insert(name.to_string(), id);
            }
        }

        Self {
            engine,
            control_rx: Some(control_rx),
            pending: HashMap::new(),
            next_ticket: 1,
            args,
            conf_classes: HashSet::new(),
            session_dirs,
            pid1,
            shutdown: false,
        }
    }

    /// Read the configuration directory, replacing changed classes and
    /// tombstoning removed ones.
    ///
    /// Classes at the top level are global; each `sessions/<name>/`
    /// subdirectory holds one session scope, skipped entirely under
    /// `--no-sessions`.
    pub fn load_configuration(&mut self) {
        let dir = self
            .args
            .confdir
            .clone()
            .unwrap_or_else(crate::env::default_confdir);

        let mut loaded: HashSet<String> = HashSet::new();

        match crate::conf::load_conf_dir(&dir) {
            Ok(classes) => {
                for class in classes {
                    self.register_conf_class(class, &mut loaded);
                }
            }
            Err(err) => {
                warn!(
                    "failed to read configuration directory {}: {err}",
                    dir.display()
                );
            }
        }

        if !self.args.no_sessions {
            match crate::conf::load_session_dirs(&dir) {
                Ok(sessions) => {
                    for session in sessions {
                        let id = self.session_id_for(&session);
                        for mut class in session.classes {
                            class.session = Some(id);
                            self.register_conf_class(class, &mut loaded);
                        }
                    }
                }
                Err(err) => {
                    warn!("failed to read session directories under {}: {err}", dir.display());
                }
            }
        }

        for name in self.conf_classes.difference(&loaded) {
            self.engine.remove_class(name);
        }
        info!("loaded {} classes from {}", loaded.len(), dir.display());
        self.conf_classes = loaded;
    }

    /// The session id for a session directory, registering it on first
    /// sight.
    fn session_id_for(&mut self, conf: &SessionConf) -> SessionId {
        if let Some(id) = self.session_dirs.get(&conf.name) {
            return *id;
        }
        let id = self.engine.register_session(Session {
            chroot: None,
            user: None,
            conf_path: Some(conf.conf_path.clone()),
        });
        info!("registered session {} for {}", id, conf.conf_path.display());
        self.session_dirs.insert(conf.name.clone(), id);
        id
    }

    /// Register one configuration-sourced class. The registry is keyed by
    /// name alone, so a name already owned by a different scope is
    /// refused rather than silently captured.
    fn register_conf_class(&mut self, class: JobClass, loaded: &mut HashSet<String>) {
        if let Some(existing) = self.engine.class(&class.name) {
            if existing.session != class.session {
                warn!(
                    "class {} is already registered in another session, skipped",
                    class.name
                );
                return;
            }
        }
        loaded.insert(class.name.to_string());
        self.engine.register_class(class);
    }

    /// Queue the startup event, unless flags or a re-exec suppress it.
    pub fn emit_startup_event(&mut self) {
        if let Some(name) = self.args.startup_event() {
            info!("emitting {name} event");
            self.engine.emit_event(name, EnvTable::new(), None);
        }
    }

    pub fn engine_mut(&mut self) -> &mut DaemonEngine {
        &mut self.engine
    }

    /// Pump until shutdown.
    pub async fn run(mut self) {
        let Some(mut control_rx) = self.control_rx.take() else {
            return;
        };
        let mut sigchld = match signal(SignalKind::child()) {
            Ok(s) => s,
            Err(e) => {
                error!("cannot install SIGCHLD handler: {e}");
                return;
            }
        };
        let mut sighup = signal(SignalKind::hangup()).ok();
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();
        let mut sigwinch = signal(SignalKind::window_change()).ok();
        let mut sigpwr = signal(SignalKind::from_raw(nix::libc::SIGPWR)).ok();

        loop {
            self.engine.poll();
            self.drain_replies();
            if self.shutdown {
                break;
            }

            let deadline = self.engine.next_deadline();
            let timer = async {
                match deadline {
                    Some(due) => {
                        let now = SystemClock.epoch_ms();
                        tokio::time::sleep(Duration::from_millis(due.saturating_sub(now))).await
                    }
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                msg = control_rx.recv() => match msg {
                    Some(msg) => self.handle_control(msg),
                    None => break,
                },
                _ = sigchld.recv() => self.reap_children(),
                _ = recv_opt(&mut sighup) => self.load_configuration(),
                _ = recv_opt(&mut sigterm) => self.reexec(),
                _ = recv_opt(&mut sigint) => {
                    if self.pid1 {
                        self.emit_signal_event("ctrlaltdel");
                    } else {
                        info!("interrupted, shutting down");
                        self.shutdown = true;
                    }
                },
                _ = recv_opt(&mut sigwinch) => {
                    if self.pid1 {
                        self.emit_signal_event("kbdrequest");
                    }
                },
                _ = recv_opt(&mut sigpwr) => {
                    if self.pid1 {
                        self.emit_signal_event("power-status-changed");
                    }
                },
                _ = timer => self.engine.tick(),
            }
        }

        // Give anyone still waiting a definitive answer before the
        // sockets go away.
        self.engine.fail_method_links();
        self.engine.poll();
        self.drain_replies();
        // The connection tasks still need a moment to flush those replies.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    fn emit_signal_event(&mut self, name: &str) {
        info!("emitting {name} event");
        self.engine.emit_event(name, EnvTable::new(), None);
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket::from_u64(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    fn handle_control(&mut self, msg: ControlMsg) {
        let ControlMsg { request, reply } = msg;
        match request {
            Request::Ping => send(reply, Response::Pong),

            Request::Version => send(
                reply,
                Response::Version { version: crate::env::VERSION.to_string() },
            ),

            Request::Start { name, env, wait, session } => {
                self.job_request(reply, wait, move |engine, ticket| {
                    engine.start_job(&name, &env, ticket, session)
                });
            }

            Request::Stop { path, env, wait, session } => {
                self.job_request(reply, wait, move |engine, ticket| {
                    engine.stop_job(&path, &env, ticket, session)
                });
            }

            Request::Restart { path, env, wait, session } => {
                self.job_request(reply, wait, move |engine, ticket| {
                    engine.restart_job(&path, &env, ticket, session)
                });
            }

            Request::EmitEvent { name, env, wait, session } => {
                self.job_request(reply, wait, move |engine, ticket| {
                    engine.emit_request(&name, &env, ticket, session)
                });
            }

            Request::GetAllJobs { session } => {
                send(reply, Response::Paths { paths: self.engine.all_jobs(session) })
            }

            Request::GetJobByName { name, session } => {
                send(reply, path_response(self.engine.job_by_name(&name, session)))
            }

            Request::GetAllInstances { path, session } => {
                match self.engine.all_instances(&path, session) {
                    Ok(paths) => send(reply, Response::Paths { paths }),
                    Err(e) => send(reply, Response::error(e)),
                }
            }

            Request::GetInstanceByName { path, name, session } => send(
                reply,
                path_response(self.engine.instance_by_name(&path, &name, session)),
            ),

            Request::GetInstance { path, session } => match self.engine.instance_info(&path, session) {
                Ok(info) => send(
                    reply,
                    Response::Instance {
                        name: info.name,
                        goal: info.goal,
                        state: info.state,
                        processes: info
                            .processes
                            .into_iter()
                            .map(|(role, pid)| ProcessEntry { role, pid })
                            .collect(),
                    },
                ),
                Err(e) => send(reply, Response::error(e)),
            },

            Request::Reload => {
                self.load_configuration();
                send(reply, Response::Ok);
            }

            Request::Shutdown => {
                if self.pid1 {
                    // Process 1 does not exit on request.
                    send(reply, Response::error(ControlError::PermissionDenied));
                } else {
                    send(reply, Response::ShuttingDown);
                    self.shutdown = true;
                }
            }
        }
    }

    fn job_request<F>(&mut self, reply: oneshot::Sender<Response>, wait: bool, operation: F)
    where
        F: FnOnce(&mut DaemonEngine, Option<Ticket>) -> Result<Outcome, ControlError>,
    {
        if wait {
            let ticket = self.issue_ticket();
            match operation(&mut self.engine, Some(ticket)) {
                Ok(Outcome::Deferred) => {
                    self.pending.insert(ticket, reply);
                }
                Ok(Outcome::Replied(body)) => send(reply, body_response(body)),
                Err(e) => send(reply, Response::error(e)),
            }
        } else {
            match operation(&mut self.engine, None) {
                Ok(Outcome::Replied(body)) => send(reply, body_response(body)),
                Ok(Outcome::Deferred) => {
                    debug_assert!(false, "deferred outcome without a ticket");
                    send(reply, Response::Ok);
                }
                Err(e) => send(reply, Response::error(e)),
            }
        }
    }

    fn drain_replies(&mut self) {
        for completion in self.engine.take_replies() {
            let Some(reply) = self.pending.remove(&completion.ticket) else {
                warn!("completed reply for unknown ticket {}", completion.ticket);
                continue;
            };
            let response = match completion.result {
                Ok(body) => body_response(body),
                Err(e) => Response::error(e),
            };
            // A failed send means the peer hung up while waiting; the
            // reply is simply dropped.
            let _ = reply.send(response);
        }
    }

    fn reap_children(&mut self) {
        loop {
            match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    self.engine.child_exited(pid.as_raw() as u32, code & 0xff);
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    self.engine.child_exited(pid.as_raw() as u32, (sig as i32) << 8);
                }
                Ok(WaitStatus::StillAlive) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    /// Serialize and exec ourselves with the state on an inherited
    /// descriptor. Returns only when the exec failed.
    fn reexec(&mut self) {
        info!("re-executing for state hand-off");
        let doc = self.engine.serialize_state();
        self.drain_replies();

        let json = match serde_json::to_vec(&doc) {
            Ok(json) => json,
            Err(err) => {
                error!("cannot serialize state: {err}");
                return;
            }
        };

        if let Err(err) = crate::reexec::exec_with_state(&json, &self.args.reexec_args()) {
            error!("re-exec failed, continuing: {err}");
        }
    }
}

async fn recv_opt(stream: &mut Option<tokio::signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending().await,
    }
}

fn send(reply: oneshot::Sender<Response>, response: Response) {
    let _ = reply.send(response);
}

fn body_response(body: ReplyBody) -> Response {
    match body {
        ReplyBody::Done => Response::Ok,
        ReplyBody::Path(path) => Response::Path { path },
    }
}

fn path_response(result: Result<String, ControlError>) -> Response {
    match result {
        Ok(path) => Response::Path { path },
        Err(e) => Response::error(e),
    }
}

#[cfg(test)]
#[path = "engine_loop_tests.rs"]
mod tests;
