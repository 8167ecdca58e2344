// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatcher: single consumer of the event queue.
//!
//! A dedicated task pops events in batches, appends each to the store
//! (failures counted, never fatal), then fans out to registered callbacks
//! whose kind and severity filters match. On shutdown the queue is drained
//! before the task exits, so every accepted event reaches the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vnids_core::{EventKind, EventRecord, Severity};
use vnids_queue::MpscQueue;
use vnids_storage::EventStore;

/// Events popped per iteration before yielding.
pub const BATCH_SIZE: usize = 100;

/// Idle sleep when the queue yields nothing.
pub const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Registered callback limit.
pub const MAX_CALLBACKS: usize = 16;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Callback limit reached ({MAX_CALLBACKS})")]
    CallbacksFull,

    #[error("Dispatcher already started")]
    AlreadyStarted,
}

/// Callbacks run on the dispatcher task and must not re-enter dispatcher
/// APIs. A slow callback stalls all consumers.
pub type EventCallback = Box<dyn Fn(&EventRecord) + Send + Sync>;

struct CallbackEntry {
    /// `None` matches any kind.
    kind_filter: Option<EventKind>,
    /// Delivered iff `event.severity <= min_severity` (lower is more severe).
    min_severity: Severity,
    callback: EventCallback,
}

#[derive(Default)]
struct Counters {
    stored: AtomicU64,
    store_errors: AtomicU64,
    delivered: AtomicU64,
}

/// Point sample of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DispatchStats {
    pub stored: u64,
    pub store_errors: u64,
    pub delivered: u64,
}

/// Queue consumer handle.
pub struct Dispatcher {
    callbacks: Arc<Mutex<Vec<CallbackEntry>>>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Register a filtered callback. At most [`MAX_CALLBACKS`] entries.
    pub fn register_callback(
        &self,
        callback: EventCallback,
        kind_filter: Option<EventKind>,
        min_severity: Severity,
    ) -> Result<(), DispatchError> {
        let mut callbacks = self.callbacks.lock();
        if callbacks.len() >= MAX_CALLBACKS {
            return Err(DispatchError::CallbacksFull);
        }
        callbacks.push(CallbackEntry { kind_filter, min_severity, callback });
        Ok(())
    }

    /// Spawn the consumer task.
    pub fn start(
        &self,
        queue: Arc<MpscQueue<EventRecord>>,
        store: Arc<EventStore>,
    ) -> Result<(), DispatchError> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(DispatchError::AlreadyStarted);
        }
        *handle = Some(tokio::spawn(consume_loop(
            queue,
            store,
            Arc::clone(&self.callbacks),
            Arc::clone(&self.counters),
            self.cancel.clone(),
        )));
        Ok(())
    }

    /// Cancel the task; it drains the queue before exiting.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            stored: self.counters.stored.load(Ordering::Relaxed),
            store_errors: self.counters.store_errors.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
        }
    }
}

async fn consume_loop(
    queue: Arc<MpscQueue<EventRecord>>,
    store: Arc<EventStore>,
    callbacks: Arc<Mutex<Vec<CallbackEntry>>>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
) {
    info!("dispatcher started");
    loop {
        let mut popped = 0;
        while popped < BATCH_SIZE {
            match queue.pop() {
                Some(event) => {
                    process(&event, &store, &callbacks, &counters);
                    popped += 1;
                }
                None => break,
            }
        }

        if cancel.is_cancelled() {
            break;
        }
        if popped == 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_SLEEP) => {}
            }
        }
    }

    // Shutdown drain: everything the queue accepted still reaches the store
    let remaining = queue.drain();
    if !remaining.is_empty() {
        info!(count = remaining.len(), "draining queue on shutdown");
    }
    for event in &remaining {
        process(event, &store, &callbacks, &counters);
    }
    info!("dispatcher stopped");
}

fn process(
    event: &EventRecord,
    store: &EventStore,
    callbacks: &Mutex<Vec<CallbackEntry>>,
    counters: &Counters,
) {
    match store.insert(event) {
        Ok(()) => {
            counters.stored.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.store_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "event store insert failed");
        }
    }

    // Held only around dispatch iteration; at-most-once per matching entry
    let callbacks = callbacks.lock();
    for entry in callbacks.iter() {
        let kind_matches = entry.kind_filter.map_or(true, |kind| kind == event.kind);
        if kind_matches && event.severity <= entry.min_severity {
            (entry.callback)(event);
            counters.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
