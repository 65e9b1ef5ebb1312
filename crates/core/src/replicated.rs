// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The replicated log: the embedding API of the core
//!
//! Owns the log files, the offset tracker, the delayed-task pool and the
//! replicator thread, and exposes the operations the surrounding metadata
//! server calls: the synchronous and asynchronous write paths on the
//! leader, the append handler on the follower, recovery at init and
//! promotion on takeover.
//!
//! The write contract is acknowledge-always: a local append never fails
//! the caller because of the follower. A slow or unreachable follower
//! flips the node into master-only mode instead, and the replicator clears
//! the mode once the follower has caught back up.

use crate::checkpoint::AppliedCheckpoint;
use crate::config::{ReplicaConfig, Role, SyncOptions};
use crate::error::SyncError;
use crate::log::{LogReader, LogWriter};
use crate::recovery;
use crate::replicator;
use crate::timer::DelayPool;
use crate::tracker::{AckCallback, OffsetSnapshot, OffsetTracker};
use crate::transport::{AppendRequest, AppendResponse, ReplicaTransport};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// State-machine apply function; receives every entry exactly once, in
/// log order, on each node.
pub type ApplyFn = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Everything that exists only after `init`
struct Runtime {
    tracker: Arc<OffsetTracker>,
    writer: Mutex<LogWriter>,
    /// Held by a follower until promotion hands it to the replicator
    reader: Mutex<Option<LogReader>>,
    checkpoint: AppliedCheckpoint,
    pool: DelayPool,
    apply: ApplyFn,
    replicator: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    fn writer(&self) -> MutexGuard<'_, LogWriter> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Two-node primary/backup replicated log
pub struct ReplicatedLog {
    config: ReplicaConfig,
    options: SyncOptions,
    transport: Arc<dyn ReplicaTransport>,
    apply: Mutex<Option<ApplyFn>>,
    role: Mutex<Role>,
    runtime: OnceLock<Runtime>,
}

impl ReplicatedLog {
    /// Validate the configuration and build an uninitialized core.
    ///
    /// `register_callback` must be called before `init`.
    pub fn new(
        config: ReplicaConfig,
        options: SyncOptions,
        transport: Arc<dyn ReplicaTransport>,
    ) -> Result<Self, SyncError> {
        config.peer()?;
        let role = config.role;
        Ok(Self {
            config,
            options,
            transport,
            apply: Mutex::new(None),
            role: Mutex::new(role),
            runtime: OnceLock::new(),
        })
    }

    /// Install the state-machine apply function. Must precede `init`;
    /// calls after `init` have no effect.
    pub fn register_callback(&self, apply: impl Fn(&[u8]) + Send + Sync + 'static) {
        let mut slot = self.apply.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(apply));
    }

    /// Open the log files, recover, and start replication.
    ///
    /// Replays `[applied, sync)` into the apply function before anything
    /// else runs; on return the node is serving its role.
    pub fn init(&self) -> Result<(), SyncError> {
        if self.runtime.get().is_some() {
            return Err(SyncError::AlreadyInitialized);
        }
        let apply = self
            .apply
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(SyncError::ApplyNotRegistered)?;

        // 1. Writer at end-of-file: its offset is the initial current/sync
        let mut writer = LogWriter::open(&self.config.log_path())?;
        let end = writer.offset();
        if self.options.fsync {
            writer.sync()?;
        }

        // 2. Random-access reader for recovery and the replicator
        let mut reader = LogReader::open(&self.config.log_path())?;

        // 3. Checkpoint bounds the redo window
        let checkpoint = AppliedCheckpoint::new(self.config.checkpoint_path());
        let applied = checkpoint.load()?.unwrap_or(0);
        if applied > end {
            return Err(SyncError::CheckpointBeyondLog { applied, end });
        }

        // 4. Redo: replay everything past the checkpoint
        recovery::replay(&mut reader, applied, end, &|entry| apply(entry))?;

        // 5. Shared state and the delayed-task pool
        let tracker = Arc::new(OffsetTracker::new(end, end));
        let pool = DelayPool::new(self.options.timer_workers)?;

        let runtime = Runtime {
            tracker: Arc::clone(&tracker),
            writer: Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            checkpoint: checkpoint.clone(),
            pool: pool.clone(),
            apply,
            replicator: Mutex::new(None),
        };
        if self.runtime.set(runtime).is_err() {
            return Err(SyncError::AlreadyInitialized);
        }
        let runtime = self.runtime.get().ok_or(SyncError::NotInitialized)?;

        // 6. Leader streams to the follower from the acknowledged offset
        if self.is_leader() {
            self.start_replicator(runtime)?;
        }

        // 7. First status line and checkpoint, then the periodic task
        checkpoint.store(end)?;
        info!(
            role = if self.is_leader() { "leader" } else { "follower" },
            current = end,
            applied = end,
            "replication core initialized"
        );
        schedule_status(
            &pool,
            Arc::clone(&tracker),
            checkpoint,
            self.options.status_interval,
        );

        Ok(())
    }

    pub fn is_leader(&self) -> bool {
        self.role.lock().unwrap_or_else(|e| e.into_inner()).is_leader()
    }

    /// Current offsets and mode
    pub fn offsets(&self) -> Result<OffsetSnapshot, SyncError> {
        Ok(self.runtime()?.tracker.snapshot())
    }

    /// Synchronous write path: append locally, then wait up to `timeout`
    /// for the follower's acknowledgement.
    ///
    /// Always returns `Ok(true)` once the entry is locally durable; a
    /// timeout is reported by entering master-only mode, not by failing
    /// the caller.
    pub fn log_sync(&self, entry: &[u8], timeout: Duration) -> Result<bool, SyncError> {
        let runtime = self.runtime()?;
        if !self.is_leader() {
            return Err(SyncError::NotLeader);
        }

        let last = {
            let mut state = runtime.tracker.lock();
            let framed = {
                let mut writer = runtime.writer();
                let framed = writer.append(entry)?;
                if self.options.fsync {
                    writer.sync()?;
                }
                framed
            };
            let last = state.current;
            state.current += framed;
            state.debug_assert_invariants();
            last
        };
        runtime.tracker.signal_work();

        // Follower already behind when this entry was written: do not wait
        {
            let mut state = runtime.tracker.lock();
            if state.master_only && state.sync < last {
                warn!("master-only mode, acknowledging without the follower");
                state.applied = state.current;
                state.debug_assert_invariants();
                return Ok(true);
            }
        }

        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = runtime.tracker.lock();
        loop {
            if state.sync == state.current {
                if state.master_only {
                    info!("follower caught up, leaving master-only mode");
                    state.master_only = false;
                }
                debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "sync append acknowledged"
                );
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _) = runtime.tracker.wait_log_done(state, deadline - now);
            state = next;
        }
        warn!(
            timeout_ms = timeout.as_millis() as u64,
            "sync append timed out, entering master-only mode"
        );
        state.master_only = true;
        Ok(true)
    }

    /// Asynchronous write path: append locally and register `completion`
    /// to fire once the follower acknowledges the entry, or after the
    /// acknowledgement timeout, whichever comes first. The completion
    /// fires exactly once either way.
    pub fn log_async(
        &self,
        entry: &[u8],
        completion: impl FnOnce(bool) + Send + 'static,
    ) -> Result<(), SyncError> {
        let runtime = self.runtime()?;
        if !self.is_leader() {
            return Err(SyncError::NotLeader);
        }
        let completion: AckCallback = Box::new(completion);

        let mut state = runtime.tracker.lock();
        let framed = {
            let mut writer = runtime.writer();
            let framed = writer.append(entry)?;
            if self.options.fsync {
                writer.sync()?;
            }
            framed
        };
        let entry_offset = state.current;

        let mut inline_ack = None;
        if state.master_only && state.sync < state.current {
            // Follower is behind, acknowledge immediately
            state.applied = state.current;
            inline_ack = Some(completion);
        } else {
            state.register_ack(entry_offset, completion);
        }
        state.current += framed;
        state.debug_assert_invariants();
        drop(state);

        match inline_ack {
            Some(completion) => {
                debug!(offset = entry_offset, "master-only mode, inline acknowledgement");
                completion(true);
            }
            None => {
                let tracker = Arc::clone(&runtime.tracker);
                runtime.pool.schedule(self.options.async_ack_timeout, move || {
                    tracker.complete_pending(entry_offset, framed, true);
                });
                runtime.tracker.signal_work();
            }
        }
        Ok(())
    }

    /// Follower-side `AppendLog` handler.
    ///
    /// The strict offset check serializes the stream: only the entry at
    /// exactly `current` is accepted, anything else is answered with a
    /// reconciliation hint. Concurrent calls are excluded by the
    /// transport's single-in-flight contract.
    pub fn append_log(&self, request: &AppendRequest) -> Result<AppendResponse, SyncError> {
        let runtime = self.runtime()?;
        if self.is_leader() {
            warn!(
                offset = request.offset,
                "append request received while leader; pair is misconfigured"
            );
            let state = runtime.tracker.lock();
            return Ok(AppendResponse::stale(state.current));
        }

        let state = runtime.tracker.lock();
        let current = state.current;
        if request.offset > current {
            info!(offset = request.offset, current, "leader ahead, asking for rewind");
            return Ok(AppendResponse::behind(current));
        }
        if request.offset < current {
            info!(offset = request.offset, current, "out-of-date append request");
            return Ok(AppendResponse::stale(current));
        }

        let framed = {
            let mut writer = runtime.writer();
            let framed = writer.append(&request.log_data)?;
            if self.options.fsync {
                writer.sync()?;
            }
            framed
        };
        drop(state);

        // Apply before advancing: a crash in between is repaired by the
        // recovery replay, never skipped past
        (runtime.apply)(&request.log_data);

        // Lock order everywhere is role, then tracker
        let role = self.role.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = runtime.tracker.lock();
        state.current += framed;
        state.applied = state.current;
        if !role.is_leader() {
            // A promotion racing this append owns `sync` from here on
            state.sync = state.current;
        }
        state.debug_assert_invariants();
        let current = state.current;
        drop(state);
        drop(role);

        debug!(current, len = request.log_data.len(), "entry appended and applied");
        Ok(AppendResponse::ack(current))
    }

    /// Promote this follower to leader.
    ///
    /// Resets `sync` to zero and starts the replicator against the peer:
    /// rather than negotiating how much of the log the new follower holds,
    /// the replicator re-sends from the start and lets the follower's
    /// rejection hints fast-forward it to the first missing offset.
    pub fn switch_to_leader(&self) -> Result<(), SyncError> {
        let runtime = self.runtime()?;
        let mut role = self.role.lock().unwrap_or_else(|e| e.into_inner());
        if role.is_leader() {
            warn!("switch_to_leader on a node that is already leader");
            return Ok(());
        }

        {
            let mut state = runtime.tracker.lock();
            state.sync = 0;
            state.debug_assert_invariants();
        }
        *role = Role::Leader;
        drop(role);

        self.start_replicator(runtime)?;
        info!("node switched to leader");
        Ok(())
    }

    /// Graceful shutdown: raise the exit flag, join the replicator and
    /// stop the delayed-task workers. Idempotent.
    pub fn shutdown(&self) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        runtime.tracker.begin_exit();
        let handle = {
            let mut slot = runtime.replicator.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        runtime.pool.shutdown();

        let snapshot = runtime.tracker.snapshot();
        if let Err(e) = runtime.checkpoint.store(snapshot.applied) {
            warn!(error = %e, "failed to persist applied checkpoint at shutdown");
        }
        info!(
            current = snapshot.current,
            sync = snapshot.sync,
            applied = snapshot.applied,
            "replication core stopped"
        );
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    fn runtime(&self) -> Result<&Runtime, SyncError> {
        self.runtime.get().ok_or(SyncError::NotInitialized)
    }

    fn start_replicator(&self, runtime: &Runtime) -> Result<(), SyncError> {
        let reader = {
            let mut slot = runtime.reader.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        let Some(reader) = reader else {
            warn!("replicator already running");
            return Ok(());
        };
        let handle = replicator::spawn(
            Arc::clone(&runtime.tracker),
            Arc::clone(&self.transport),
            reader,
            self.options.retry_backoff,
        )?;
        let mut slot = runtime.replicator.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handle);
        Ok(())
    }
}

impl Drop for ReplicatedLog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Log the offsets and persist the checkpoint, then re-arm
fn schedule_status(
    pool: &DelayPool,
    tracker: Arc<OffsetTracker>,
    checkpoint: AppliedCheckpoint,
    interval: Duration,
) {
    let next_pool = pool.clone();
    pool.schedule(interval, move || {
        let snapshot = tracker.snapshot();
        if snapshot.exiting {
            return;
        }
        info!(
            current = snapshot.current,
            sync = snapshot.sync,
            applied = snapshot.applied,
            pending = snapshot.pending,
            master_only = snapshot.master_only,
            "replication status"
        );
        if let Err(e) = checkpoint.store(snapshot.applied) {
            warn!(error = %e, "failed to persist applied checkpoint");
        }
        schedule_status(&next_pool, tracker, checkpoint, interval);
    });
}

#[cfg(test)]
#[path = "replicated_tests.rs"]
mod tests;
