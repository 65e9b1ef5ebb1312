// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport tests against scripted peer sockets

use super::*;
use std::net::{SocketAddr, TcpListener};
use std::thread::JoinHandle;

/// Accept one connection and answer each request with the next scripted
/// response, returning the requests that were seen.
fn scripted_peer(responses: Vec<Response>) -> (SocketAddr, JoinHandle<Vec<Request>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut seen = Vec::new();
        for response in responses {
            let frame = protocol::read_message(&mut stream).unwrap();
            seen.push(protocol::decode::<Request>(&frame).unwrap());
            let body = protocol::encode(&response).unwrap();
            protocol::write_message(&mut stream, &body).unwrap();
        }
        seen
    });
    (addr, handle)
}

fn request(offset: u32, payload: &[u8]) -> AppendRequest {
    AppendRequest {
        offset,
        log_data: payload.to_vec(),
    }
}

#[test]
fn append_log_round_trips() {
    let (addr, peer) = scripted_peer(vec![Response::AppendLog(AppendResponse::ack(7))]);
    let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(5));

    let response = transport.append_log(&request(0, b"abc")).unwrap();

    assert!(response.success);
    assert_eq!(response.current, 7);

    let seen = peer.join().unwrap();
    assert_eq!(
        seen,
        vec![Request::AppendLog(request(0, b"abc"))]
    );
}

#[test]
fn requests_reuse_one_connection() {
    // The peer accepts exactly once; a reconnect would never be served
    let (addr, peer) = scripted_peer(vec![
        Response::AppendLog(AppendResponse::ack(5)),
        Response::AppendLog(AppendResponse::ack(10)),
    ]);
    let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(5));

    assert!(transport.append_log(&request(0, b"a")).unwrap().success);
    assert!(transport.append_log(&request(5, b"b")).unwrap().success);

    assert_eq!(peer.join().unwrap().len(), 2);
}

#[test]
fn peer_error_response_surfaces_as_rejected() {
    let (addr, _peer) = scripted_peer(vec![Response::Error {
        message: "init may only run once".to_string(),
    }]);
    let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(5));

    let err = transport.append_log(&request(0, b"a")).unwrap_err();
    assert!(matches!(err, TransportError::Rejected(_)));
}

#[test]
fn unexpected_response_kind_is_malformed() {
    let (addr, _peer) = scripted_peer(vec![Response::Pong]);
    let transport = TcpTransport::new(addr.to_string(), Duration::from_secs(5));

    let err = transport.append_log(&request(0, b"a")).unwrap_err();
    assert!(matches!(err, TransportError::Malformed(_)));
}

#[test]
fn unreachable_peer_is_an_io_error() {
    // Grab a port that nothing listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let transport = TcpTransport::new(addr.to_string(), Duration::from_millis(500));

    let err = transport.append_log(&request(0, b"a")).unwrap_err();
    assert!(matches!(err, TransportError::Io(_)));
}

#[test]
fn closed_connection_is_dropped_and_surfaced() {
    let (addr, peer) = scripted_peer(vec![Response::AppendLog(AppendResponse::ack(5))]);
    let transport = TcpTransport::new(addr.to_string(), Duration::from_millis(500));

    assert!(transport.append_log(&request(0, b"a")).unwrap().success);
    peer.join().unwrap();

    // The scripted peer has hung up; the next exchange must fail cleanly
    let err = transport.append_log(&request(5, b"b")).unwrap_err();
    assert!(matches!(err, TransportError::Io(_)));
}
