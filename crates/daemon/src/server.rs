// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and request dispatch.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::ReplicatedLog;
use tracing::{debug, error, info};

use crate::protocol::{self, ProtocolError, Request, Response, StatusInfo};

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept connections forever, one handler thread per connection.
///
/// The leader holds a single long-lived replication connection; admin
/// clients come and go.
pub fn serve(listener: TcpListener, log: Arc<ReplicatedLog>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "accepting connections");
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "connection accepted");
                let log = Arc::clone(&log);
                let result = std::thread::Builder::new()
                    .name(format!("tandem-conn-{peer}"))
                    .spawn(move || {
                        if let Err(e) = handle_connection(stream, &log) {
                            error!(%peer, error = %e, "connection failed");
                        }
                    });
                if let Err(e) = result {
                    error!(error = %e, "failed to spawn connection handler");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}

/// Serve one connection until the client hangs up
pub fn handle_connection(mut stream: TcpStream, log: &ReplicatedLog) -> Result<(), ServerError> {
    stream.set_nodelay(true)?;

    loop {
        let frame = match protocol::read_message(&mut stream) {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let response = match protocol::decode::<Request>(&frame) {
            Ok(request) => {
                debug!(?request, "request received");
                handle_request(log, &request)
            }
            Err(e) => Response::Error {
                message: format!("malformed request: {e}"),
            },
        };

        let body = protocol::encode(&response)?;
        protocol::write_message(&mut stream, &body)?;
    }
}

/// Dispatch one request into the replication core
pub fn handle_request(log: &ReplicatedLog, request: &Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::AppendLog(append) => match log.append_log(append) {
            Ok(response) => Response::AppendLog(response),
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Log { data, timeout_ms } => {
            match log.log_sync(data, Duration::from_millis(*timeout_ms)) {
                Ok(acknowledged) => Response::Logged { acknowledged },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Status => {
            let snapshot = match log.offsets() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    return Response::Error {
                        message: e.to_string(),
                    }
                }
            };
            Response::Status(StatusInfo {
                role: if log.is_leader() { "leader" } else { "follower" }.to_string(),
                current: snapshot.current,
                sync: snapshot.sync,
                applied: snapshot.applied,
                master_only: snapshot.master_only,
                pending: snapshot.pending,
            })
        }

        Request::SwitchToLeader => match log.switch_to_leader() {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
