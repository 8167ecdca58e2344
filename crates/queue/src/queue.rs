// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crossbeam_utils::CachePadded;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Vyukov-style intrusive MPSC queue with a stub node.
//
// ## Structure
//
// `tail` is the producer end, `head` the consumer end. The list always holds
// at least one node (the stub); `head` points at the node whose payload has
// already been consumed, and `head.next` is the next value to deliver. The
// stub rotates through the list: after a pop, the popped node becomes the new
// stub.
//
// ## Producer protocol (push)
//
// 1. Allocate a node with `next = null` and the payload in place.
// 2. `prev = tail.swap(node, AcqRel)` — serializes producers; the swap is the
//    commit point that fixes cross-producer order.
// 3. `prev.next.store(node, Release)` — publishes the payload to the consumer.
//
// Between steps 2 and 3 the list is momentarily disconnected: the consumer
// sees `next == null` and reports empty even though `size > 0`. That window
// is why `len()` is approximate.
//
// ## Consumer protocol (pop)
//
// 1. `next = head.next.load(Acquire)` — synchronizes with the producer's
//    Release store; the payload write happened-before this load.
// 2. Move the payload out of `next`.
// 3. `head = next` (plain store — head is only ever written by the consumer).
// 4. Free the old head.
//
// ## Single-consumer invariant
//
// Exactly one thread may call `pop`/`drain`. `head` and node payloads are
// only touched by that thread once the Acquire load in step 1 has observed
// the node. Producers only touch `tail` and their own node's `next`.
//
// ## Capacity
//
// `size` is a separate counter checked before the swap. The check and the
// increment are not one atomic step, so under contention the queue can
// briefly overshoot the cap by the number of racing producers; it never
// grows unbounded and the consumer drains the excess normally.
// =============================================================================

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Node { next: AtomicPtr::new(ptr::null_mut()), value }))
    }
}

/// Outcome of a push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Pushed,
    /// Queue was at capacity; the value was discarded and counted.
    Full,
}

/// Counters reported by [`MpscQueue::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
}

/// Bounded lock-free multi-producer single-consumer queue.
///
/// FIFO per producer; cross-producer order is fixed by the tail exchange.
/// Push never blocks: at capacity the value is dropped and counted.
pub struct MpscQueue<T> {
    /// Producer end. Swapped by every push.
    tail: CachePadded<AtomicPtr<Node<T>>>,
    /// Consumer end. Written only by the consumer.
    head: CachePadded<AtomicPtr<Node<T>>>,
    /// Approximate number of queued values.
    size: CachePadded<AtomicUsize>,
    cap: usize,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

// Safety: nodes are heap-allocated and handed off through the atomic
// tail/next protocol above; payloads cross threads exactly once.
unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    /// Create a queue holding at most `cap` values.
    pub fn new(cap: usize) -> Self {
        let stub = Node::new(None);
        Self {
            tail: CachePadded::new(AtomicPtr::new(stub)),
            head: CachePadded::new(AtomicPtr::new(stub)),
            size: CachePadded::new(AtomicUsize::new(0)),
            cap,
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push a value. Returns [`PushResult::Full`] (and counts the drop) when
    /// the queue is at capacity. Never blocks.
    pub fn push(&self, value: T) -> PushResult {
        if self.size.load(Ordering::Acquire) >= self.cap {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return PushResult::Full;
        }

        let node = Node::new(Some(value));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        // Safety: `prev` was obtained from the tail swap, so we are the only
        // producer that will ever write its `next`; the node is not freed
        // until the consumer has moved past it.
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }

        self.size.fetch_add(1, Ordering::Release);
        self.pushed.fetch_add(1, Ordering::Relaxed);
        PushResult::Pushed
    }

    /// Pop the next value, or `None` when the queue is (momentarily) empty.
    ///
    /// Must only be called from the single consumer.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        // Safety: head is owned by the consumer; the node it points at is
        // alive until we replace it below.
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }

        // Safety: the Acquire load above observed the producer's Release
        // store, so the payload is fully initialized. A linked node's payload
        // is present by construction.
        let value = unsafe { (*next).value.take() }?;

        self.head.store(next, Ordering::Relaxed);
        // Safety: the old head is unreachable from any producer once head has
        // moved past it; only the consumer ever frees nodes.
        unsafe {
            drop(Box::from_raw(head));
        }

        self.size.fetch_sub(1, Ordering::Release);
        self.popped.fetch_add(1, Ordering::Relaxed);
        Some(value)
    }

    /// Pop everything currently visible. Used by the dispatcher on shutdown.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(value) = self.pop() {
            out.push(value);
        }
        out
    }

    /// Approximate queue length.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        // Walk the list from head, freeing every node including the stub.
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            // Safety: we have exclusive access in drop; each node is freed once.
            let next = unsafe { *(*node).next.get_mut() };
            unsafe {
                drop(Box::from_raw(node));
            }
            node = next;
        }
    }
}
