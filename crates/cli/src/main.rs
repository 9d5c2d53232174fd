// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stoker: control CLI for the stoker daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod output;

use anyhow::bail;
use clap::{Parser, Subcommand};
use stoker_wire::{Request, Response, SessionId};

#[derive(Debug, Parser)]
#[command(name = "stoker", version, about = "Control the stoker service supervisor")]
struct Cli {
    /// Session scope to act in (default: the global scope)
    #[arg(long, global = true, value_name = "ID")]
    session: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an instance of a job
    Start {
        /// Class name
        name: String,
        /// KEY=VALUE pairs added to the job environment
        env: Vec<String>,
        /// Reply as soon as the goal change is committed
        #[arg(long)]
        no_wait: bool,
    },

    /// Stop an instance of a job
    Stop {
        /// Class name or instance path
        name: String,
        /// KEY=VALUE pairs for the stop environment
        env: Vec<String>,
        /// Instance name for multiplexed classes
        #[arg(long)]
        instance: Option<String>,
        #[arg(long)]
        no_wait: bool,
    },

    /// Restart an instance of a job
    Restart {
        /// Class name or instance path
        name: String,
        env: Vec<String>,
        #[arg(long)]
        instance: Option<String>,
        #[arg(long)]
        no_wait: bool,
    },

    /// Emit an event
    Emit {
        /// Event name
        name: String,
        /// KEY=VALUE pairs carried by the event
        env: Vec<String>,
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the status of a job's instances
    Status {
        /// Class name
        name: String,
        /// Instance name for multiplexed classes
        #[arg(long)]
        instance: Option<String>,
    },

    /// List all jobs and their instances
    List,

    /// Ask the daemon to re-read its configuration directory
    Reload,

    /// Stop the daemon (development mode)
    Shutdown,

    /// Print the daemon version
    Version,
}

/// Turn a class name (or a ready-made path) plus optional instance into
/// an instance path.
fn instance_path(name: &str, instance: Option<&str>) -> String {
    if name.starts_with('/') {
        return name.to_string();
    }
    match instance {
        Some(instance) if !instance.is_empty() => format!("/jobs/{name}/{instance}"),
        _ => format!("/jobs/{name}/_"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let session = cli.session.map(SessionId::from_u64);

    match cli.command {
        Command::Start { name, env, no_wait } => {
            let response = client::call(
                &Request::Start { name, env, wait: !no_wait, session },
                !no_wait,
            )
            .await?;
            match expect(response)? {
                Response::Path { path } => println!("{path}"),
                other => print_plain(other),
            }
        }

        Command::Stop { name, env, instance, no_wait } => {
            let path = instance_path(&name, instance.as_deref());
            let response = client::call(
                &Request::Stop { path, env, wait: !no_wait, session },
                !no_wait,
            )
            .await?;
            print_plain(expect(response)?);
        }

        Command::Restart { name, env, instance, no_wait } => {
            let path = instance_path(&name, instance.as_deref());
            let response = client::call(
                &Request::Restart { path, env, wait: !no_wait, session },
                !no_wait,
            )
            .await?;
            match expect(response)? {
                Response::Path { path } => println!("{path}"),
                other => print_plain(other),
            }
        }

        Command::Emit { name, env, no_wait } => {
            let response = client::call(
                &Request::EmitEvent { name, env, wait: !no_wait, session },
                !no_wait,
            )
            .await?;
            print_plain(expect(response)?);
        }

        Command::Status { name, instance } => {
            let path = instance_path(&name, instance.as_deref());
            let response = client::call(&Request::GetInstance { path, session }, false).await?;
            match expect(response)? {
                Response::Instance { name: instance, goal, state, processes } => {
                    println!("{}", output::format_status(&name, &instance, &goal, &state, &processes));
                }
                other => print_plain(other),
            }
        }

        Command::List => {
            let response = client::call(&Request::GetAllJobs { session }, false).await?;
            let Response::Paths { paths } = expect(response)? else {
                bail!("unexpected response to GetAllJobs");
            };
            for job_path in paths {
                list_job(&job_path, session).await?;
            }
        }

        Command::Reload => {
            print_plain(expect(client::call(&Request::Reload, false).await?)?);
        }

        Command::Shutdown => {
            print_plain(expect(client::call(&Request::Shutdown, false).await?)?);
        }

        Command::Version => {
            match expect(client::call(&Request::Version, false).await?)? {
                Response::Version { version } => println!("stokerd {version}"),
                other => print_plain(other),
            }
        }
    }

    Ok(())
}

async fn list_job(job_path: &str, session: Option<SessionId>) -> anyhow::Result<()> {
    let class = job_path.rsplit('/').next().unwrap_or(job_path).to_string();

    let response = client::call(
        &Request::GetAllInstances { path: job_path.to_string(), session },
        false,
    )
    .await?;
    let Response::Paths { paths } = expect(response)? else {
        bail!("unexpected response to GetAllInstances");
    };

    if paths.is_empty() {
        println!("{class} stop/waiting");
        return Ok(());
    }

    for path in paths {
        let response = client::call(&Request::GetInstance { path, session }, false).await?;
        if let Response::Instance { name, goal, state, processes } = expect(response)? {
            println!("{}", output::format_status(&class, &name, &goal, &state, &processes));
        }
    }
    Ok(())
}

/// Convert an error response into a failure exit.
fn expect(response: Response) -> anyhow::Result<Response> {
    match response {
        Response::Error { error, message } => bail!("{error:?}: {message}"),
        other => Ok(other),
    }
}

fn print_plain(response: Response) {
    match response {
        Response::Ok => {}
        Response::ShuttingDown => println!("shutting down"),
        other => println!("{other:?}"),
    }
}
