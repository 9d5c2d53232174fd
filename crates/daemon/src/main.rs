// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stokerd: the event-driven service supervisor.

use clap::Parser;
use stoker_daemon::args::Args;
use stoker_daemon::engine_loop::{DaemonEngine, EngineLoop};
use stoker_daemon::procs::RealProcessOps;
use stoker_daemon::{env, lifecycle, listener, reexec};
use stoker_core::{Engine, StateDoc, SystemClock};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),

    #[error("cannot read state descriptor: {0}")]
    StateRead(#[from] reexec::ReexecError),

    #[error("state document rejected: {0}")]
    StateParse(#[from] serde_json::Error),

    #[error("state document rejected: {0}")]
    StateRestore(#[from] stoker_core::StateError),
}

fn main() {
    let args = Args::parse();
    init_tracing(&args);

    if let Err(err) = run(args) {
        error!("{err}");
        eprintln!("stokerd: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_env("STOKER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&args.logdir, args.no_log) {
        (Some(dir), false) => {
            let appender = tracing_appender::rolling::never(dir, "stokerd.log");
            builder.with_writer(appender).with_ansi(false).init();
        }
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: Args) -> Result<(), DaemonError> {
    info!("stokerd {} starting", env::VERSION);

    // Build the engine first: on `--restart` the state document must be
    // accepted before we commit to serving.
    let engine = build_engine(&args)?;

    let (context, control_socket) = lifecycle::startup(env::socket_path(), env::lock_path())?;

    let (control_tx, control_rx) = mpsc::channel(64);
    let mut engine_loop = EngineLoop::new(engine, control_rx, args);
    engine_loop.load_configuration();
    engine_loop.emit_startup_event();

    let listener_task = tokio::spawn(listener::run(control_socket, control_tx));

    // The loop owns the engine; when it returns the daemon is done.
    engine_loop.run().await;

    listener_task.abort();
    context.cleanup();
    info!("stokerd stopped");
    Ok(())
}

fn build_engine(args: &Args) -> Result<DaemonEngine, DaemonError> {
    let procs = RealProcessOps::new(args.no_log);
    let clock = SystemClock;

    match (args.restart, args.state_fd) {
        (true, Some(fd)) => {
            let raw = reexec::read_state_fd(fd)?;
            let doc: StateDoc = serde_json::from_slice(&raw)?;
            let engine = Engine::restore(procs, clock, doc)?;
            info!("restored state from descriptor {fd}");
            Ok(engine)
        }
        _ => Ok(Engine::new(procs, clock)),
    }
}
