// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the replication core

use crate::log::LogError;
use thiserror::Error;

/// Errors surfaced by the replication core.
///
/// Configuration and log-file errors are fatal at init; transport failures
/// never reach the caller (the replicator retries them forever).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("node {addr} is not in the cluster node list")]
    NodeNotInCluster { addr: String },

    #[error("cluster node list must name exactly two nodes, got {count}")]
    BadNodeCount { count: usize },

    #[error("apply callback must be registered before init")]
    ApplyNotRegistered,

    #[error("init must complete before logging entries")]
    NotInitialized,

    #[error("init may only run once")]
    AlreadyInitialized,

    #[error("log writes are only valid on the leader")]
    NotLeader,

    #[error("applied checkpoint {applied} is beyond the log end {end}")]
    CheckpointBeyondLog { applied: u32, end: u32 },

    #[error("recovery replay crossed an entry boundary: reached {reached}, expected {expected}")]
    ReplayMisaligned { reached: u32, expected: u32 },

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
