// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors surfaced to control-endpoint callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a control request can fail with.
///
/// The variant names are the wire tags; they are stable protocol surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ControlError {
    #[error("job is already running")]
    AlreadyStarted,

    #[error("job has already been stopped")]
    AlreadyStopped,

    #[error("you do not have permission to modify this job")]
    PermissionDenied,

    #[error("job failed")]
    JobFailed,

    #[error("event failed")]
    EventFailed,

    #[error("unknown job")]
    UnknownJob,

    #[error("unknown instance")]
    UnknownInstance,

    #[error("insufficient memory")]
    NoMemory,

    #[error("invalid argument")]
    InvalidArgument,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
