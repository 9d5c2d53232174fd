// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use stoker_core::ControlError;

/// One live process of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessEntry {
    pub role: String,
    pub pid: u32,
}

/// Response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Version { version: String },

    /// A single job or instance path
    Path { path: String },

    /// A list of paths
    Paths { paths: Vec<String> },

    /// Instance properties
    Instance {
        name: String,
        goal: String,
        state: String,
        processes: Vec<ProcessEntry>,
    },

    /// Daemon is shutting down
    ShuttingDown,

    /// Typed error with a human-readable message
    Error { error: ControlError, message: String },
}

impl Response {
    /// Build the error response for a control failure.
    pub fn error(error: ControlError) -> Self {
        Response::Error { error, message: error.to_string() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
