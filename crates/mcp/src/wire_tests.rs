// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::JsonRpcRequest;
use serde_json::json;

#[tokio::test]
async fn write_then_read_round_trips() {
    let (client, server) = tokio::io::duplex(4096);
    let (server_read, _server_write) = tokio::io::split(server);
    let (_client_read, mut client_write) = tokio::io::split(client);

    let request = JsonRpcRequest::new(7, "tools/list", json!({}));
    write_message(&mut client_write, &request).await.unwrap();

    let mut reader = BufReader::new(server_read);
    let received: JsonRpcRequest = read_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(received.method, "tools/list");
    assert_eq!(received.id, Some(json!(7)));
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let input = b"\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
    let mut reader = BufReader::new(&input[..]);
    let received: JsonRpcRequest = read_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(received.method, "ping");
}

#[tokio::test]
async fn end_of_stream_is_none() {
    let input: &[u8] = b"";
    let mut reader = BufReader::new(input);
    let received: Option<JsonRpcRequest> = read_message(&mut reader).await.unwrap();
    assert!(received.is_none());
}

#[tokio::test]
async fn malformed_json_is_an_error() {
    let input: &[u8] = b"{not json}\n";
    let mut reader = BufReader::new(input);
    let result: Result<Option<JsonRpcRequest>, _> = read_message(&mut reader).await;
    assert!(result.is_err());
}
