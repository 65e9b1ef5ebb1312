// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between the two daemons and admin clients
//!
//! Messages are JSON bodies framed by a four-byte big-endian length
//! prefix, one request/response exchange at a time per connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tandem_core::{AppendRequest, AppendResponse};
use thiserror::Error;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Requests accepted by a daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Liveness probe
    Ping,
    /// Replication append from the leader
    AppendLog(AppendRequest),
    /// Append an entry through the leader's synchronous write path
    Log { data: Vec<u8>, timeout_ms: u64 },
    /// Offsets and mode of this node
    Status,
    /// External promotion trigger
    SwitchToLeader,
}

/// Responses returned by a daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    AppendLog(AppendResponse),
    Logged { acknowledged: bool },
    Status(StatusInfo),
    Ok,
    Error { message: String },
}

/// Snapshot of a node's replication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub role: String,
    pub current: u32,
    pub sync: u32,
    pub applied: u32,
    pub master_only: bool,
    pub pending: usize,
}

/// Serialize a message to its JSON body (no length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Parse a message from a JSON body
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed frame
pub fn write_message(writer: &mut impl Write, body: &[u8]) -> Result<(), ProtocolError> {
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// End-of-stream before or inside a frame reports `ConnectionClosed`.
pub fn read_message(reader: &mut impl Read) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).map_err(map_eof)?;
    let len = u32::from_be_bytes(prefix) as usize;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(map_eof)?;
    Ok(body)
}

fn map_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
