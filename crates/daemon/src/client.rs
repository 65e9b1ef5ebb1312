// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP transport toward the peer daemon
//!
//! Implements the core's transport seam over a cached blocking
//! connection. Any failure drops the connection and surfaces an error;
//! the replicator owns the retry policy.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;
use tandem_core::{AppendRequest, AppendResponse, ReplicaTransport, TransportError};
use tracing::debug;

use crate::protocol::{self, ProtocolError, Request, Response};

/// Blocking RPC client for the peer node
pub struct TcpTransport {
    peer: String,
    timeout: Duration,
    conn: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    pub fn new(peer: impl Into<String>, timeout: Duration) -> Self {
        Self {
            peer: peer.into(),
            timeout,
            conn: Mutex::new(None),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let addr = self
            .peer
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("peer address {} did not resolve", self.peer),
                )
            })?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_nodelay(true)?;
        debug!(peer = %self.peer, "connected to peer");
        Ok(stream)
    }

    /// One request/response exchange.
    ///
    /// Holding the connection lock across the exchange keeps at most one
    /// request in flight, which the follower's append handler relies on.
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        if conn.is_none() {
            *conn = Some(self.connect()?);
        }
        let Some(stream) = conn.as_mut() else {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no connection",
            )));
        };

        match roundtrip(stream, request) {
            Ok(response) => Ok(response),
            Err(e) => {
                // Stale connections are never reused
                *conn = None;
                Err(map_protocol_error(e))
            }
        }
    }
}

fn roundtrip(stream: &mut TcpStream, request: &Request) -> Result<Response, ProtocolError> {
    let body = protocol::encode(request)?;
    protocol::write_message(stream, &body)?;
    let frame = protocol::read_message(stream)?;
    protocol::decode(&frame)
}

fn map_protocol_error(e: ProtocolError) -> TransportError {
    match e {
        ProtocolError::Io(io) => TransportError::Io(io),
        ProtocolError::ConnectionClosed => TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "peer closed the connection",
        )),
        ProtocolError::Json(e) => TransportError::Malformed(e.to_string()),
    }
}

impl ReplicaTransport for TcpTransport {
    fn append_log(&self, request: &AppendRequest) -> Result<AppendResponse, TransportError> {
        match self.exchange(&Request::AppendLog(request.clone()))? {
            Response::AppendLog(response) => Ok(response),
            Response::Error { message } => Err(TransportError::Rejected(message)),
            other => Err(TransportError::Malformed(format!(
                "unexpected response to append: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
