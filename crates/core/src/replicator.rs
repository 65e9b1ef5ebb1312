// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader-side replication loop
//!
//! A dedicated thread parked on `work_available`. Whenever `sync` trails
//! `current` it streams entries from the log reader to the follower,
//! reconciling offsets on rejection and advancing `sync` on every
//! acknowledgement. Transport failures are retried forever with a
//! cancellable backoff; the thread only returns on shutdown.

use crate::log::{entry, LogReader};
use crate::tracker::OffsetTracker;
use crate::transport::{AppendRequest, ReplicaTransport};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

enum Drain {
    CaughtUp,
    Exit,
}

/// Start the replicator thread. `reader` must belong to the same log file
/// the tracker's offsets describe.
pub(crate) fn spawn(
    tracker: Arc<OffsetTracker>,
    transport: Arc<dyn ReplicaTransport>,
    reader: LogReader,
    backoff: Duration,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("tandem-replicator".to_string())
        .spawn(move || run(&tracker, transport.as_ref(), reader, backoff))
}

fn run(
    tracker: &OffsetTracker,
    transport: &dyn ReplicaTransport,
    mut reader: LogReader,
    backoff: Duration,
) {
    info!("replicator started");
    loop {
        let guard = tracker.lock();
        let guard = tracker.wait_for_work(guard);
        if guard.exiting {
            info!("replicator exiting");
            return;
        }
        drop(guard);

        if let Drain::Exit = drain(tracker, transport, &mut reader, backoff) {
            info!("replicator exiting");
            return;
        }
    }
}

/// Stream entries until `sync` reaches `current`, then signal `log_done`
fn drain(
    tracker: &OffsetTracker,
    transport: &dyn ReplicaTransport,
    reader: &mut LogReader,
    backoff: Duration,
) -> Drain {
    loop {
        let (sync, current) = {
            let mut guard = tracker.lock();
            if guard.exiting {
                return Drain::Exit;
            }
            if guard.sync == guard.current {
                // Fully acknowledged entries are safe for the local state
                // machine as well
                if guard.applied < guard.current {
                    guard.applied = guard.current;
                }
                guard.debug_assert_invariants();
                drop(guard);
                tracker.signal_log_done();
                return Drain::CaughtUp;
            }
            (guard.sync, guard.current)
        };

        // The reader trails `sync`: reposition after rewinds, fast-forwards
        // and failed reads
        if reader.offset() != sync {
            if let Err(e) = reader.seek(sync) {
                error!(error = %e, sync, "failed to seek log reader");
                if tracker.sleep_unless_exiting(backoff) {
                    return Drain::Exit;
                }
                continue;
            }
        }

        let payload = match reader.read_entry() {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, offset = sync, "failed to read entry for replication");
                if tracker.sleep_unless_exiting(backoff) {
                    return Drain::Exit;
                }
                continue;
            }
        };
        let framed = entry::PREFIX_LEN + payload.len() as u32;

        debug!(sync, current, len = payload.len(), "sending entry");
        let request = AppendRequest {
            offset: sync,
            log_data: payload,
        };
        let response = loop {
            match transport.append_log(&request) {
                Ok(response) => break response,
                Err(e) => {
                    warn!(error = %e, sync, current, "replication send failed, backing off");
                    if tracker.sleep_unless_exiting(backoff) {
                        return Drain::Exit;
                    }
                }
            }
        };

        if !response.success {
            let mut guard = tracker.lock();
            if response.offset >= 0 {
                // Follower is behind: rewind and resend from its position
                let hint = u32::try_from(response.offset).unwrap_or(u32::MAX);
                let target = hint.min(guard.current);
                info!(from = guard.sync, to = target, "follower behind, rewinding");
                guard.sync = target;
            } else {
                // Stale request: the follower already holds these bytes.
                // Fast-forward to its reported position instead of looping.
                let target = response.current.min(guard.current);
                if response.current > guard.current {
                    error!(
                        peer_current = response.current,
                        current = guard.current,
                        "peer log is ahead of ours; logs diverged and need manual repair"
                    );
                }
                info!(from = guard.sync, to = target, "stale request, fast-forwarding");
                guard.sync = target;
            }
            guard.debug_assert_invariants();
            continue;
        }

        // Acknowledged: fire any pending async completion, then advance
        tracker.complete_pending(sync, framed, false);

        let mut guard = tracker.lock();
        guard.sync += framed;
        debug!(sync = guard.sync, current = guard.current, "entry replicated");
        if guard.master_only && guard.sync == guard.current {
            info!("follower caught up, leaving master-only mode");
            guard.master_only = false;
        }
        guard.debug_assert_invariants();
    }
}
