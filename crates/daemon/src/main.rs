// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tandemd: two-node replicated metadata log daemon
//!
//! Hosts the replication core and serves its RPC endpoint: the peer's
//! `AppendLog` stream plus the admin surface (status, promotion, and the
//! leader's write path for embedding processes on the other side of a
//! socket).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod protocol;
mod server;

use anyhow::Context;
use clap::Parser;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ReplicaConfig, ReplicatedLog, Role, SyncOptions};
use tracing::{debug, info};

use crate::client::TcpTransport;

/// How long one replication exchange may take before the connection is
/// dropped and the replicator backs off
const RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "tandemd")]
#[command(about = "Two-node replicated metadata log daemon")]
#[command(version)]
struct Args {
    /// Comma-separated two-node address list (host:port,host:port)
    #[arg(long)]
    nodes: String,

    /// This node's own address, exactly as it appears in --nodes
    #[arg(long)]
    addr: String,

    /// Initial role of this node (master or slave)
    #[arg(long)]
    role: Role,

    /// Data directory holding the log and checkpoint files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Sync the log file to disk after every append
    #[arg(long)]
    fsync: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let nodes: Vec<String> = args
        .nodes
        .split(',')
        .map(|node| node.trim().to_string())
        .filter(|node| !node.is_empty())
        .collect();
    let config = ReplicaConfig::new(nodes, args.addr.clone(), args.role, &args.data_dir)
        .context("invalid replica configuration")?;
    let peer = config.peer()?.to_string();

    let options = SyncOptions {
        fsync: args.fsync,
        ..SyncOptions::default()
    };
    let transport = Arc::new(TcpTransport::new(peer.clone(), RPC_TIMEOUT));

    let log = Arc::new(ReplicatedLog::new(config, options, transport)?);
    // The real state machine lives in the embedding metadata server; the
    // standalone daemon only traces what it is handed.
    log.register_callback(|entry| {
        debug!(len = entry.len(), "entry applied");
    });
    log.init().context("replication core failed to start")?;

    let listener =
        TcpListener::bind(&args.addr).with_context(|| format!("failed to bind {}", args.addr))?;
    info!(
        addr = %args.addr,
        %peer,
        role = if log.is_leader() { "leader" } else { "follower" },
        "tandemd ready"
    );

    server::serve(listener, log)?;
    Ok(())
}
