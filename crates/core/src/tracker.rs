// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offset tracker: the shared replication state under one coarse mutex
//!
//! Guards the three offsets, the degraded-mode and exit flags, and the
//! pending-callback map. Two condvars carry the producer/replicator
//! rendezvous: `work_available` wakes the replicator when `current`
//! advances, `log_done` wakes synchronous writers when `sync` catches up.
//! Every offset transition happens while holding the mutex; file and
//! network I/O happen outside it.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Completion callback for an asynchronous write. Fires exactly once.
pub type AckCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Replication state guarded by the tracker's mutex
pub struct Shared {
    /// One past the last byte appended locally; the next write offset
    pub current: u32,
    /// One past the last byte acknowledged by the follower
    pub sync: u32,
    /// One past the last byte consumed by the local state machine
    pub applied: u32,
    /// Degraded mode: stop waiting on a follower known to be behind
    pub master_only: bool,
    /// Graceful-shutdown flag observed by every wait loop
    pub exiting: bool,
    /// Async completions keyed by the entry's start offset
    pending: BTreeMap<u32, AckCallback>,
}

impl Shared {
    /// Register an async completion for the entry starting at `offset`
    pub fn register_ack(&mut self, offset: u32, callback: AckCallback) {
        let prev = self.pending.insert(offset, callback);
        debug_assert!(prev.is_none(), "duplicate ack registration at {offset}");
    }

    fn take_ack(&mut self, offset: u32) -> Option<AckCallback> {
        self.pending.remove(&offset)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Offset invariants that hold whenever the lock is released
    pub fn debug_assert_invariants(&self) {
        debug_assert!(self.sync <= self.current, "sync {} > current {}", self.sync, self.current);
        debug_assert!(
            self.applied <= self.current,
            "applied {} > current {}",
            self.applied,
            self.current
        );
        debug_assert!(self.pending.keys().all(|&k| k < self.current));
    }
}

/// Offsets and mode as observed at one instant, for status and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSnapshot {
    pub current: u32,
    pub sync: u32,
    pub applied: u32,
    pub master_only: bool,
    pub exiting: bool,
    pub pending: usize,
}

/// The coarse lock plus both rendezvous condvars
pub struct OffsetTracker {
    shared: Mutex<Shared>,
    work_available: Condvar,
    log_done: Condvar,
}

impl OffsetTracker {
    /// Start tracking with `current = sync = start` (the log file length)
    /// and the checkpointed `applied`.
    pub fn new(start: u32, applied: u32) -> Self {
        Self {
            shared: Mutex::new(Shared {
                current: start,
                sync: start,
                applied,
                master_only: false,
                exiting: false,
                pending: BTreeMap::new(),
            }),
            work_available: Condvar::new(),
            log_done: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wake the replicator: `current` advanced
    pub fn signal_work(&self) {
        self.work_available.notify_one();
    }

    /// Park until there is unreplicated data or shutdown begins
    pub fn wait_for_work<'a>(&'a self, mut guard: MutexGuard<'a, Shared>) -> MutexGuard<'a, Shared> {
        while !guard.exiting && guard.sync == guard.current {
            debug!("replicator waiting for work");
            guard = self
                .work_available
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
        guard
    }

    /// Wake synchronous writers: `sync` caught up with `current`
    pub fn signal_log_done(&self) {
        self.log_done.notify_all();
    }

    /// Timed wait on `log_done`. Returns the reacquired guard and whether
    /// the wait timed out.
    pub fn wait_log_done<'a>(
        &'a self,
        guard: MutexGuard<'a, Shared>,
        timeout: Duration,
    ) -> (MutexGuard<'a, Shared>, bool) {
        let (guard, result) = self
            .log_done
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner());
        (guard, result.timed_out())
    }

    /// Sleep for `backoff` unless shutdown begins first. Returns true when
    /// the caller should exit.
    pub fn sleep_unless_exiting(&self, backoff: Duration) -> bool {
        let deadline = std::time::Instant::now() + backoff;
        let mut guard = self.lock();
        loop {
            if guard.exiting {
                return true;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .work_available
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }

    /// Begin shutdown: raise `exiting` and unblock every wait loop
    pub fn begin_exit(&self) {
        let mut guard = self.lock();
        guard.exiting = true;
        drop(guard);
        self.work_available.notify_all();
        self.log_done.notify_all();
    }

    pub fn snapshot(&self) -> OffsetSnapshot {
        let guard = self.lock();
        OffsetSnapshot {
            current: guard.current,
            sync: guard.sync,
            applied: guard.applied,
            master_only: guard.master_only,
            exiting: guard.exiting,
            pending: guard.pending_len(),
        }
    }

    /// Fire the pending completion for the entry at `offset`, if it is
    /// still registered.
    ///
    /// Called by the replicator on acknowledgement and by the delayed
    /// timeout check; whichever arrives first takes the callback out of the
    /// map, so it fires at most once. The callback runs outside the lock.
    /// When the timeout check is the one that finds the callback, the
    /// replicator failed to acknowledge the entry in time and the node
    /// enters master-only mode.
    pub fn complete_pending(&self, offset: u32, len: u32, timeout_check: bool) {
        let mut guard = self.lock();
        let Some(callback) = guard.take_ack(offset) else {
            return;
        };
        drop(guard);

        callback(true);

        let mut guard = self.lock();
        let end = offset + len;
        if end > guard.applied {
            guard.applied = end;
        }
        if timeout_check {
            warn!(offset, "async acknowledgement timed out, entering master-only mode");
            guard.master_only = true;
        }
        guard.debug_assert_invariants();
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
