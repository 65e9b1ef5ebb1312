// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch tests against a real core instance

use super::*;
use tandem_core::{
    AppendRequest, AppendResponse, ReplicaConfig, ReplicaTransport, ReplicatedLog, Role,
    SyncOptions, TransportError,
};
use tempfile::TempDir;

/// Transport that never reaches a peer
struct NullTransport;

impl ReplicaTransport for NullTransport {
    fn append_log(&self, _request: &AppendRequest) -> Result<AppendResponse, TransportError> {
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no peer in this test",
        )))
    }
}

fn test_node(role: Role) -> (TempDir, Arc<ReplicatedLog>) {
    let dir = TempDir::new().unwrap();
    let addr = match role {
        Role::Leader => "127.0.0.1:7411",
        Role::Follower => "127.0.0.1:7412",
    };
    let config = ReplicaConfig::new(
        vec!["127.0.0.1:7411".to_string(), "127.0.0.1:7412".to_string()],
        addr,
        role,
        dir.path(),
    )
    .unwrap();
    let options = SyncOptions {
        retry_backoff: Duration::from_millis(20),
        status_interval: Duration::from_secs(300),
        ..SyncOptions::default()
    };

    let log = Arc::new(ReplicatedLog::new(config, options, Arc::new(NullTransport)).unwrap());
    log.register_callback(|_| {});
    log.init().unwrap();
    (dir, log)
}

#[test]
fn ping_returns_pong() {
    let (_dir, log) = test_node(Role::Follower);

    assert_eq!(handle_request(&log, &Request::Ping), Response::Pong);
}

#[test]
fn append_log_dispatches_into_the_core() {
    let (_dir, log) = test_node(Role::Follower);

    let response = handle_request(
        &log,
        &Request::AppendLog(AppendRequest {
            offset: 0,
            log_data: b"abc".to_vec(),
        }),
    );

    match response {
        Response::AppendLog(inner) => {
            assert!(inner.success);
            assert_eq!(inner.current, 7);
        }
        other => panic!("expected AppendLog response, got {other:?}"),
    }
}

#[test]
fn replayed_append_is_rejected_as_stale() {
    let (_dir, log) = test_node(Role::Follower);
    let request = Request::AppendLog(AppendRequest {
        offset: 0,
        log_data: b"abc".to_vec(),
    });

    handle_request(&log, &request);
    let response = handle_request(&log, &request);

    match response {
        Response::AppendLog(inner) => {
            assert!(!inner.success);
            assert_eq!(inner.offset, -1);
        }
        other => panic!("expected AppendLog response, got {other:?}"),
    }
}

#[test]
fn log_on_a_follower_is_an_error() {
    let (_dir, log) = test_node(Role::Follower);

    let response = handle_request(
        &log,
        &Request::Log {
            data: b"abc".to_vec(),
            timeout_ms: 0,
        },
    );

    assert!(matches!(response, Response::Error { .. }));
}

#[test]
fn log_on_the_leader_acknowledges() {
    let (_dir, log) = test_node(Role::Leader);

    // No reachable follower: the zero timeout degrades into master-only
    // mode but the write is still acknowledged
    let response = handle_request(
        &log,
        &Request::Log {
            data: b"abc".to_vec(),
            timeout_ms: 0,
        },
    );

    assert_eq!(response, Response::Logged { acknowledged: true });
    assert!(log.offsets().unwrap().master_only);
}

#[test]
fn status_reports_offsets_and_role() {
    let (_dir, log) = test_node(Role::Follower);
    handle_request(
        &log,
        &Request::AppendLog(AppendRequest {
            offset: 0,
            log_data: b"abc".to_vec(),
        }),
    );

    let response = handle_request(&log, &Request::Status);

    match response {
        Response::Status(status) => {
            assert_eq!(status.role, "follower");
            assert_eq!(status.current, 7);
            assert_eq!(status.applied, 7);
            assert!(!status.master_only);
            assert_eq!(status.pending, 0);
        }
        other => panic!("expected Status response, got {other:?}"),
    }
}

#[test]
fn switch_to_leader_promotes_the_node() {
    let (_dir, log) = test_node(Role::Follower);

    let response = handle_request(&log, &Request::SwitchToLeader);

    assert_eq!(response, Response::Ok);
    assert!(log.is_leader());
}

#[test]
fn connection_round_trips_over_tcp() {
    let (_dir, log) = test_node(Role::Follower);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        handle_connection(stream, &log)
    });

    let mut stream = TcpStream::connect(addr).unwrap();

    let body = protocol::encode(&Request::Ping).unwrap();
    protocol::write_message(&mut stream, &body).unwrap();
    let frame = protocol::read_message(&mut stream).unwrap();
    assert_eq!(protocol::decode::<Response>(&frame).unwrap(), Response::Pong);

    let body = protocol::encode(&Request::Status).unwrap();
    protocol::write_message(&mut stream, &body).unwrap();
    let frame = protocol::read_message(&mut stream).unwrap();
    assert!(matches!(
        protocol::decode::<Response>(&frame).unwrap(),
        Response::Status(_)
    ));

    drop(stream);
    server.join().unwrap().unwrap();
}
