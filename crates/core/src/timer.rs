// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delayed-task worker pool
//!
//! A deadline-ordered heap drained by a small set of worker threads. The
//! core schedules two kinds of work on it: the async-acknowledgement
//! timeout checks and the periodic status/checkpoint task. Tasks pending at
//! shutdown are dropped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Scheduled {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest deadline first, insertion order as tiebreak
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

struct PoolState {
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    shutdown: bool,
}

struct Inner {
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Cloneable handle to the worker pool
#[derive(Clone)]
pub struct DelayPool {
    inner: Arc<Inner>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DelayPool {
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let inner = Arc::new(Inner {
            state: Mutex::new(PoolState {
                queue: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("tandem-timer-{i}"))
                .spawn(move || worker_loop(&inner))?;
            handles.push(handle);
        }

        Ok(Self {
            inner,
            workers: Arc::new(Mutex::new(handles)),
        })
    }

    /// Run `job` once after `delay`
    pub fn schedule(&self, delay: Duration, job: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.shutdown {
            debug!("delay pool shut down, dropping scheduled task");
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Scheduled {
            due: Instant::now() + delay,
            seq,
            job: Box::new(job),
        });
        drop(state);
        self.inner.available.notify_one();
    }

    /// Stop the workers and drop any tasks that have not fired
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.shutdown = true;
            state.queue.clear();
        }
        self.inner.available.notify_all();

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .len()
    }
}

fn worker_loop(inner: &Inner) {
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        if state.shutdown {
            return;
        }

        let now = Instant::now();
        match state.queue.peek() {
            None => {
                state = inner
                    .available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
            Some(next) if next.due > now => {
                let timeout = next.due - now;
                let (next_state, _) = inner
                    .available
                    .wait_timeout(state, timeout)
                    .unwrap_or_else(|e| e.into_inner());
                state = next_state;
            }
            Some(_) => {
                let Some(scheduled) = state.queue.pop() else {
                    continue;
                };
                drop(state);
                (scheduled.job)();
                state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            }
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
