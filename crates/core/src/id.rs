// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Arena handles for engine-owned records.
//!
//! Events and jobs live in insertion-ordered arenas inside the engine;
//! everything that needs to refer to one across a mutation holds a handle,
//! never a reference. Handles are engine-local counters and are only
//! meaningful against the engine that issued them.

/// Define a newtype handle over `u64`.
///
/// Generates `Display`, `From<u64>`, and an `as_u64()` accessor. Handles are
/// issued by the engine's arenas; `from_u64` exists for deserialization.
///
/// ```ignore
/// define_handle! {
///     /// Doc comment for the handle type.
///     pub struct EventId;
/// }
/// ```
#[macro_export]
macro_rules! define_handle {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_u64(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_handle! {
    /// Handle of an event in the queue.
    pub struct EventId;
}

define_handle! {
    /// Handle of a job instance in the job arena.
    pub struct JobId;
}

define_handle! {
    /// Handle of a session scope.
    pub struct SessionId;
}

define_handle! {
    /// Handle of a deferred control reply, issued by the control endpoint.
    pub struct Ticket;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
