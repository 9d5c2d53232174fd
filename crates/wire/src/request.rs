// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use stoker_core::SessionId;

/// Request from a client to the daemon.
///
/// Job and event requests carry the caller's session handle; `None` is
/// the global scope. Deriving the handle from the peer's chroot is the
/// transport's concern, not the protocol's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Daemon version handshake
    Version,

    /// Create or reuse an instance of the named class and start it
    Start {
        name: String,
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        wait: bool,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Stop the instance at `path`
    Stop {
        path: String,
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        wait: bool,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Stop then start the instance at `path`
    Restart {
        path: String,
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        wait: bool,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Enqueue a named event
    EmitEvent {
        name: String,
        #[serde(default)]
        env: Vec<String>,
        #[serde(default)]
        wait: bool,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Paths of all job classes visible to the session
    GetAllJobs {
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Path of the class named `name`
    GetJobByName {
        name: String,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Paths of all instances of the class at `path`
    GetAllInstances {
        path: String,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Path of the instance of `path` named `name`
    GetInstanceByName {
        path: String,
        name: String,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Properties of the instance at `path`
    GetInstance {
        path: String,
        #[serde(default)]
        session: Option<SessionId>,
    },

    /// Re-read the configuration directory
    Reload,

    /// Stop the daemon (development mode; PID 1 ignores this)
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
