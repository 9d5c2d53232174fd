// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control socket.
//!
//! Connections are request/reply: each one carries a single framed
//! request. The request is forwarded to the engine loop over a channel
//! with a reply slot, so every engine mutation stays on the main loop.

use crate::env::ipc_timeout;
use stoker_wire::{read_request, write_response, ProtocolError, Request, Response};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// A control request paired with where to send its response.
pub struct ControlMsg {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Accept connections until the daemon shuts down, spawning a task per
/// connection.
pub async fn run(listener: UnixListener, control_tx: mpsc::Sender<ControlMsg>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let control_tx = control_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, control_tx).await {
                        log_connection_error(e);
                    }
                });
            }
            Err(e) => error!("accept error: {e}"),
        }
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    control_tx: mpsc::Sender<ControlMsg>,
) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = read_request(&mut reader, ipc_timeout()).await?;
    debug!(request = ?request, "received request");

    let (reply_tx, reply_rx) = oneshot::channel();
    if control_tx
        .send(ControlMsg { request, reply: reply_tx })
        .await
        .is_err()
    {
        // Engine loop is gone; the daemon is shutting down.
        return Ok(());
    }

    // Waiting requests hold the connection until the engine releases the
    // reply; a dropped sender means the peer's wait ended in shutdown.
    let Ok(response) = reply_rx.await else {
        return Ok(());
    };

    write_response(&mut writer, &response, ipc_timeout()).await
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => debug!("connection timeout"),
        _ => error!("connection error: {e}"),
    }
}
