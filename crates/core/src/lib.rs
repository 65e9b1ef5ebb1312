// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tandem-core: two-node primary/backup replication for an append-only
//! metadata log.
//!
//! The leader appends length-prefixed entries to a local log file and
//! streams them to a single follower. Three offsets drive the protocol:
//! `current` (locally appended), `sync` (acknowledged by the follower) and
//! `applied` (consumed by the local state machine). When the follower lags
//! past a caller's deadline the leader degrades into master-only mode and
//! keeps acknowledging writes; the replicator clears the mode once the
//! follower catches back up.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod log;
pub mod recovery;
pub mod timer;
pub mod tracker;
pub mod transport;

mod replicated;
mod replicator;

pub use checkpoint::AppliedCheckpoint;
pub use config::{ReplicaConfig, Role, SyncOptions};
pub use error::SyncError;
pub use log::{LogError, LogReader, LogWriter};
pub use replicated::{ApplyFn, ReplicatedLog};
pub use tracker::OffsetSnapshot;
pub use transport::{AppendRequest, AppendResponse, ReplicaTransport, TransportError};
