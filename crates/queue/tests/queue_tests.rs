// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue accounting and ordering tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vnids_queue::{MpscQueue, PushResult};

#[test]
fn fifo_per_producer() {
    let queue = MpscQueue::new(64);
    for i in 0..10 {
        assert_eq!(queue.push(i), PushResult::Pushed);
    }
    for i in 0..10 {
        assert_eq!(queue.pop(), Some(i));
    }
    assert_eq!(queue.pop(), None);
}

#[test]
fn full_queue_drops_and_counts() {
    let queue = MpscQueue::new(4);
    for i in 0..4 {
        assert_eq!(queue.push(i), PushResult::Pushed);
    }
    // Two refused pushes: counted, nothing stored
    assert_eq!(queue.push(98), PushResult::Full);
    assert_eq!(queue.push(99), PushResult::Full);

    let stats = queue.stats();
    assert_eq!(stats.pushed, 4);
    assert_eq!(stats.dropped, 2);
    assert_eq!(queue.len(), 4);

    // The stored values are the first four, unchanged
    assert_eq!(queue.drain(), vec![0, 1, 2, 3]);
    assert_eq!(queue.stats().popped, 4);
}

#[test]
fn capacity_frees_up_after_pop() {
    let queue = MpscQueue::new(2);
    queue.push(1);
    queue.push(2);
    assert_eq!(queue.push(3), PushResult::Full);
    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.push(3), PushResult::Pushed);
    assert_eq!(queue.drain(), vec![2, 3]);
}

#[test]
fn every_push_is_popped_exactly_once_across_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u64 = 10_000;

    let queue = Arc::new(MpscQueue::new(usize::MAX >> 1));
    let mut handles = Vec::new();
    for p in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        handles.push(std::thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                assert_eq!(queue.push((p as u64) << 32 | i), PushResult::Pushed);
            }
        }));
    }

    // Single consumer runs concurrently with the producers
    let consumer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let mut seen: Vec<u64> = Vec::new();
            let expected = PRODUCERS as u64 * PER_PRODUCER;
            while (seen.len() as u64) < expected {
                match queue.pop() {
                    Some(v) => seen.push(v),
                    None => std::thread::yield_now(),
                }
            }
            seen
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    let seen = consumer.join().unwrap();

    // Exactly once each, FIFO within each producer
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER as usize);
    for p in 0..PRODUCERS as u64 {
        let from_p: Vec<u64> =
            seen.iter().copied().filter(|v| v >> 32 == p).map(|v| v & 0xffff_ffff).collect();
        assert_eq!(from_p.len(), PER_PRODUCER as usize);
        assert!(from_p.windows(2).all(|w| w[0] < w[1]), "producer {p} order violated");
    }

    let stats = queue.stats();
    assert_eq!(stats.pushed, PRODUCERS as u64 * PER_PRODUCER);
    assert_eq!(stats.popped, stats.pushed);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn queued_values_are_released_on_drop() {
    struct Tracked(Arc<AtomicUsize>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    {
        let queue = MpscQueue::new(16);
        for _ in 0..5 {
            queue.push(Tracked(Arc::clone(&drops)));
        }
        let popped = queue.pop();
        drop(popped);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        // Four values still queued when the queue itself drops
    }
    assert_eq!(drops.load(Ordering::SeqCst), 5);
}

#[test]
fn len_reflects_pushes_and_pops() {
    let queue = MpscQueue::new(8);
    assert!(queue.is_empty());
    queue.push("a");
    queue.push("b");
    assert_eq!(queue.len(), 2);
    queue.pop();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.capacity(), 8);
}
