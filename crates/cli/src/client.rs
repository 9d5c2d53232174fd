// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the control socket.

use anyhow::Context;
use std::time::Duration;
use stoker_daemon::env::{ipc_timeout, socket_path};
use stoker_wire::{read_message, write_message, Request, Response};
use tokio::net::UnixStream;

/// Ceiling on how long a `wait` request may hold the connection.
const WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Send one request and wait for its response.
///
/// `waiting` requests keep the connection open until the daemon releases
/// the reply, so they read with a far larger timeout than queries.
pub async fn call(request: &Request, waiting: bool) -> anyhow::Result<Response> {
    let path = socket_path();
    let stream = UnixStream::connect(&path).await.with_context(|| {
        format!(
            "cannot connect to {} (is stokerd running?)",
            path.display()
        )
    })?;
    let (mut reader, mut writer) = stream.into_split();

    write_message(&mut writer, request, ipc_timeout())
        .await
        .context("sending request")?;

    let timeout = if waiting { WAIT_TIMEOUT } else { ipc_timeout() };
    read_message(&mut reader, timeout)
        .await
        .context("reading response")
}
