// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Class-definition loader.
//!
//! Classes are TOML documents, one per file under the configuration
//! directory; the file stem is the class name. A malformed file is skipped
//! with a warning so one bad definition cannot take the supervisor down.

use indexmap::IndexMap;
use serde::Deserialize;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use stoker_core::{
    parse_condition, signal_number, Expect, JobClass, ParseError, ProcessRole, ProcessSpec,
    RespawnPolicy,
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid {field} condition: {source}")]
    Condition {
        field: &'static str,
        source: ParseError,
    },

    #[error("unknown process role {0:?}")]
    UnknownRole(String),

    #[error("unknown expect mode {0:?} (none, fork, daemon, stop)")]
    UnknownExpect(String),

    #[error("process {0} must define exactly one of `exec` or `script`")]
    ProcessSpecConflict(String),

    #[error("normal-exit entry {0:?} is neither a status nor a signal name")]
    BadNormalExit(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ClassFile {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default)]
    start_on: Option<String>,
    #[serde(default)]
    stop_on: Option<String>,
    #[serde(default)]
    task: bool,
    #[serde(default)]
    respawn: bool,
    #[serde(default)]
    respawn_limit: Option<RespawnLimitFile>,
    #[serde(default)]
    expect: Option<String>,
    #[serde(default)]
    kill_timeout_secs: Option<u64>,
    #[serde(default)]
    export: Vec<String>,
    #[serde(default)]
    normal_exit: Vec<toml::Value>,
    #[serde(default)]
    env: IndexMap<String, String>,
    #[serde(default)]
    process: IndexMap<String, ProcessFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RespawnLimitFile {
    count: u32,
    interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessFile {
    #[serde(default)]
    exec: Option<Vec<String>>,
    #[serde(default)]
    script: Option<String>,
}

/// Parse one class definition.
pub fn load_class_file(name: &str, contents: &str) -> Result<JobClass, ConfError> {
    let file: ClassFile = toml::from_str(contents)?;
    let mut class = JobClass::new(SmolStr::from(name));

    class.description = file.description;
    class.instance = file.instance.unwrap_or_default();
    class.task = file.task;
    class.respawn = file.respawn;
    class.export = file.export;

    if let Some(condition) = file.start_on {
        class.start_on = Some(
            parse_condition(&condition)
                .map_err(|source| ConfError::Condition { field: "start-on", source })?,
        );
    }
    if let Some(condition) = file.stop_on {
        class.stop_on = Some(
            parse_condition(&condition)
                .map_err(|source| ConfError::Condition { field: "stop-on", source })?,
        );
    }

    if let Some(limit) = file.respawn_limit {
        class.respawn_limit =
            RespawnPolicy { count: limit.count, interval_secs: limit.interval_secs };
    }

    if let Some(expect) = file.expect {
        class.expect = match expect.as_str() {
            "none" => Expect::None,
            "fork" => Expect::Fork,
            "daemon" => Expect::Daemon,
            "stop" => Expect::Stop,
            _ => return Err(ConfError::UnknownExpect(expect)),
        };
    }

    if let Some(timeout) = file.kill_timeout_secs {
        class.kill_timeout_secs = timeout;
    }

    for entry in file.normal_exit {
        let status = match &entry {
            toml::Value::Integer(status) => *status as i32,
            toml::Value::String(name) => signal_number(name)
                .map(|signum| signum << 8)
                .ok_or_else(|| ConfError::BadNormalExit(name.clone()))?,
            other => return Err(ConfError::BadNormalExit(other.to_string())),
        };
        class.normal_exit.push(status);
    }

    for (key, value) in file.env {
        class.env.set(&key, &value);
    }

    for (role_name, process) in file.process {
        let role = ProcessRole::from_name(&role_name)
            .ok_or_else(|| ConfError::UnknownRole(role_name.clone()))?;
        let spec = match (process.exec, process.script) {
            (Some(argv), None) if !argv.is_empty() => ProcessSpec::Exec(argv),
            (None, Some(script)) => ProcessSpec::Script(script),
            _ => return Err(ConfError::ProcessSpecConflict(role_name)),
        };
        class.processes.insert(role, spec);
    }

    Ok(class)
}

/// Load every `*.toml` class file in `dir`, in name order. Files that fail
/// to parse are skipped with a warning.
pub fn load_conf_dir(dir: &Path) -> Result<Vec<JobClass>, ConfError> {
    let mut names: Vec<(String, std::path::PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        names.push((stem.to_string(), path));
    }
    names.sort();

    let mut classes = Vec::new();
    for (name, path) in names {
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("skipping unreadable class file {}: {err}", path.display());
                continue;
            }
        };
        match load_class_file(&name, &contents) {
            Ok(class) => classes.push(class),
            Err(err) => warn!("skipping class file {}: {err}", path.display()),
        }
    }
    Ok(classes)
}

/// The classes of one session scope, keyed by its directory name.
#[derive(Debug)]
pub struct SessionConf {
    pub name: String,
    pub conf_path: PathBuf,
    pub classes: Vec<JobClass>,
}

/// Scan `<dir>/sessions/*/` for per-session class directories.
///
/// Each subdirectory is one session scope; its name keys the session
/// across reloads and re-execs. A missing `sessions` directory means no
/// scoped classes at all.
pub fn load_session_dirs(dir: &Path) -> Result<Vec<SessionConf>, ConfError> {
    let root = dir.join("sessions");
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(&root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        sessions.push(SessionConf {
            name: name.to_string(),
            classes: load_conf_dir(&path)?,
            conf_path: path,
        });
    }
    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sessions)
}

#[cfg(test)]
#[path = "conf_tests.rs"]
mod tests;
