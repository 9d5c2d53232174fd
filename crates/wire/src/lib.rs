// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-endpoint protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod request;
mod response;

pub use codec::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    MAX_MESSAGE_BYTES,
};
pub use request::Request;
pub use response::{ProcessEntry, Response};

pub use stoker_core::{ControlError, SessionId};
