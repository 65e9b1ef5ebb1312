// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica pair configuration and tunables

use crate::error::SyncError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Role of a node in the replica pair.
///
/// The role is assigned externally at startup; the core never elects. A
/// follower may be promoted once via `switch_to_leader`, a leader is never
/// demoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn is_leader(self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Role::Leader),
            "slave" => Ok(Role::Follower),
            other => Err(format!("unknown role {:?} (expected master or slave)", other)),
        }
    }
}

/// Static configuration for one node of the replica pair
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// The two node addresses making up the pair
    pub nodes: Vec<String>,
    /// This node's own address; must appear in `nodes`
    pub addr: String,
    /// Initial role
    pub role: Role,
    /// Directory holding the log and checkpoint files
    pub data_dir: PathBuf,
}

impl ReplicaConfig {
    pub fn new(
        nodes: Vec<String>,
        addr: impl Into<String>,
        role: Role,
        data_dir: impl Into<PathBuf>,
    ) -> Result<Self, SyncError> {
        let config = Self {
            nodes,
            addr: addr.into(),
            role,
            data_dir: data_dir.into(),
        };
        // Fail fast: a node outside its own cluster list is a deployment bug
        config.peer()?;
        Ok(config)
    }

    /// The other node of the pair, derived by elimination
    pub fn peer(&self) -> Result<&str, SyncError> {
        if self.nodes.len() != 2 {
            return Err(SyncError::BadNodeCount {
                count: self.nodes.len(),
            });
        }
        if self.addr == self.nodes[0] {
            Ok(&self.nodes[1])
        } else if self.addr == self.nodes[1] {
            Ok(&self.nodes[0])
        } else {
            Err(SyncError::NodeNotInCluster {
                addr: self.addr.clone(),
            })
        }
    }

    /// Path of the append-only log file
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("sync.log")
    }

    /// Path of the applied-offset checkpoint sidecar
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("applied.log")
    }
}

/// Timing and durability tunables.
///
/// Defaults carry the production constants; tests shrink them to keep the
/// suite fast.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// How long an async write may stay unacknowledged before its callback
    /// fires through the timeout path and master-only mode is entered
    pub async_ack_timeout: Duration,
    /// Backoff between replication attempts after a transport failure
    pub retry_backoff: Duration,
    /// Interval of the status line and checkpoint persistence
    pub status_interval: Duration,
    /// Worker threads servicing delayed tasks
    pub timer_workers: usize,
    /// Sync the log file to disk after every append
    pub fsync: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            async_ack_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(5),
            status_interval: Duration::from_secs(5),
            timer_workers: 10,
            fsync: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
