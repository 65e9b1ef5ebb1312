// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replication RPC types and the transport seam
//!
//! The core does not carry its own network stack; it hands `AppendLog`
//! requests to a [`ReplicaTransport`] and interprets the response. The
//! daemon provides the TCP implementation, tests provide fakes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `AppendLog` request: one entry plus the offset it must land at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendRequest {
    /// Entry offset on the leader (the replicator's `sync` at send time)
    pub offset: u32,
    /// The entry payload, without the length prefix
    pub log_data: Vec<u8>,
}

/// `AppendLog` response.
///
/// `offset` is the reconciliation hint: on a rejection it is either the
/// follower's `current` (the leader is ahead, rewind to it) or `-1` (the
/// request was stale; the follower already holds these bytes). `current`
/// always reports the follower's append position so a stale leader can
/// fast-forward instead of resending bytes the follower has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendResponse {
    pub success: bool,
    pub offset: i64,
    pub current: u32,
}

impl AppendResponse {
    /// The entry was appended and applied
    pub fn ack(current: u32) -> Self {
        Self {
            success: true,
            offset: i64::from(current),
            current,
        }
    }

    /// The follower is behind the requested offset; resend from `current`
    pub fn behind(current: u32) -> Self {
        Self {
            success: false,
            offset: i64::from(current),
            current,
        }
    }

    /// The request is stale; the follower is already past it
    pub fn stale(current: u32) -> Self {
        Self {
            success: false,
            offset: -1,
            current,
        }
    }
}

/// Errors the transport may surface to the replicator.
///
/// All of them are retried with backoff; the replicator never gives up on
/// the peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed peer response: {0}")]
    Malformed(String),

    #[error("peer rejected the request: {0}")]
    Rejected(String),
}

/// Carrier for the `AppendLog` RPC toward the peer
pub trait ReplicaTransport: Send + Sync {
    /// Deliver one append request and return the peer's response.
    ///
    /// Blocking; at most one request is in flight per node. An error means
    /// the request may or may not have reached the peer; the offset
    /// reconciliation in the response protocol makes the retry safe.
    fn append_log(&self, request: &AppendRequest) -> Result<AppendResponse, TransportError>;
}
