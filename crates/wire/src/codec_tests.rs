// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

#[test]
fn encode_prefixes_payload_length() {
    let frame = encode(&Request::Ping).unwrap();
    let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    assert_eq!(len as usize, frame.len() - 4);

    let decoded: Request = decode(&frame[4..]).unwrap();
    assert_eq!(decoded, Request::Ping);
}

#[tokio::test]
async fn read_back_what_was_written() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let request = Request::Start {
        name: "web".to_string(),
        env: vec!["A=1".to_string()],
        wait: false,
        session: None,
    };
    write_message(&mut client, &request, TIMEOUT).await.unwrap();

    let received = read_request(&mut server, TIMEOUT).await.unwrap();
    assert_eq!(received, request);
}

#[tokio::test]
async fn closed_connection_is_distinguished_from_errors() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);

    let result = read_request(&mut server, TIMEOUT).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn truncated_frame_is_a_closed_connection() {
    let (mut client, mut server) = tokio::io::duplex(64);

    let frame = encode(&Request::Ping).unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, &frame[..frame.len() - 2])
        .await
        .unwrap();
    drop(client);

    let result = read_request(&mut server, TIMEOUT).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);

    let huge = (MAX_MESSAGE_BYTES + 1).to_be_bytes();
    tokio::io::AsyncWriteExt::write_all(&mut client, &huge).await.unwrap();

    let result = read_request(&mut server, TIMEOUT).await;
    assert!(matches!(result, Err(ProtocolError::TooLarge(_))));
}

#[tokio::test]
async fn slow_peer_times_out() {
    let (_client, mut server) = tokio::io::duplex(64);

    let result = read_request(&mut server, Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}

proptest! {
    #[test]
    fn arbitrary_event_names_round_trip(name in "[a-z][a-z0-9/-]{0,40}", wait: bool) {
        let request = Request::EmitEvent { name, env: vec![], wait, session: None };
        let frame = encode(&request).unwrap();
        let decoded: Request = decode(&frame[4..]).unwrap();
        prop_assert_eq!(decoded, request);
    }
}
