// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn task_runs_after_its_delay() {
    let pool = DelayPool::new(2).unwrap();
    let (tx, rx) = mpsc::channel();

    pool.schedule(Duration::from_millis(20), move || {
        tx.send(()).unwrap();
    });

    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    pool.shutdown();
}

#[test]
fn tasks_fire_in_deadline_order_on_a_single_worker() {
    let pool = DelayPool::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (delay_ms, tag) in [(120u64, "late"), (10, "early"), (60, "middle")] {
        let order = Arc::clone(&order);
        pool.schedule(Duration::from_millis(delay_ms), move || {
            order.lock().unwrap().push(tag);
        });
    }

    assert!(wait_until(Duration::from_secs(5), || {
        order.lock().unwrap().len() == 3
    }));
    assert_eq!(*order.lock().unwrap(), vec!["early", "middle", "late"]);
    pool.shutdown();
}

#[test]
fn many_due_tasks_all_run() {
    let pool = DelayPool::new(4).unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..32 {
        let count = Arc::clone(&count);
        pool.schedule(Duration::from_millis(1), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(wait_until(Duration::from_secs(5), || {
        count.load(Ordering::SeqCst) == 32
    }));
    pool.shutdown();
}

#[test]
fn shutdown_drops_tasks_that_have_not_fired() {
    let pool = DelayPool::new(2).unwrap();
    let fired = Arc::new(AtomicBool::new(false));

    {
        let fired = Arc::clone(&fired);
        pool.schedule(Duration::from_secs(60), move || {
            fired.store(true, Ordering::SeqCst);
        });
    }
    assert_eq!(pool.pending_len(), 1);

    pool.shutdown();

    assert_eq!(pool.pending_len(), 0);
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn schedule_after_shutdown_is_dropped() {
    let pool = DelayPool::new(1).unwrap();
    pool.shutdown();

    pool.schedule(Duration::from_millis(1), || {});

    assert_eq!(pool.pending_len(), 0);
}

#[test]
fn shutdown_is_idempotent() {
    let pool = DelayPool::new(2).unwrap();
    pool.shutdown();
    pool.shutdown();
}

#[test]
fn clones_share_the_same_queue() {
    let pool = DelayPool::new(1).unwrap();
    let clone = pool.clone();
    let count = Arc::new(AtomicUsize::new(0));

    for handle in [&pool, &clone] {
        let count = Arc::clone(&count);
        handle.schedule(Duration::from_millis(1), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(wait_until(Duration::from_secs(5), || {
        count.load(Ordering::SeqCst) == 2
    }));
    pool.shutdown();
}
