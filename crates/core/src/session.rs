// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session scopes for chroot and per-user supervision.
//!
//! A session is an opaque scope handle: classes belong to at most one, and
//! an event scoped to a session only dispatches against that session's
//! classes. The global scope is represented by `None` everywhere.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A chroot or per-user supervision scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub chroot: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<u32>,
    /// Configuration directory the session's classes were loaded from.
    #[serde(default)]
    pub conf_path: Option<PathBuf>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
