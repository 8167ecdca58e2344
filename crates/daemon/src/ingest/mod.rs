// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingest worker: owns the event-socket reader and the EVE parser.
//!
//! A dedicated task loops: ensure connected (1 s backoff), wait for
//! readiness (100 ms bound), drain framed lines. Stats events replace the
//! latest snapshot; security events are pushed onto the queue with drops
//! counted; parse failures are counted and never fatal.

pub mod parser;
pub mod reader;

pub use parser::{parse_line, ParseError, ParsedLine};
pub use reader::{FillOutcome, LineReader, WaitOutcome, INITIAL_BUF_SIZE, MAX_LINE_SIZE};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vnids_core::{EventRecord, StatsSnapshot};
use vnids_queue::MpscQueue;

/// Backoff between reconnect attempts.
pub const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Readiness wait bound; keeps join latency bounded on shutdown.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Ingest counters, shared with the control plane.
#[derive(Default)]
pub struct IngestCounters {
    pub lines: AtomicU64,
    pub events: AtomicU64,
    pub stats_events: AtomicU64,
    pub ignored: AtomicU64,
    pub parse_errors: AtomicU64,
    pub reconnects: AtomicU64,
    pub oversized_lines: AtomicU64,
}

/// Point sample of the counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub events: u64,
    pub stats_events: u64,
    pub ignored: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub oversized_lines: u64,
}

impl IngestCounters {
    pub fn snapshot(&self) -> IngestStats {
        IngestStats {
            lines: self.lines.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            stats_events: self.stats_events.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            oversized_lines: self.oversized_lines.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the running ingest task.
pub struct IngestWorker {
    handle: Option<tokio::task::JoinHandle<()>>,
    cancel: CancellationToken,
    counters: Arc<IngestCounters>,
    latest_stats: Arc<Mutex<Option<StatsSnapshot>>>,
}

impl IngestWorker {
    /// Spawn the ingest task reading from `socket_path` into `queue`.
    pub fn start(socket_path: PathBuf, queue: Arc<MpscQueue<EventRecord>>) -> Self {
        let cancel = CancellationToken::new();
        let counters = Arc::new(IngestCounters::default());
        let latest_stats = Arc::new(Mutex::new(None));

        let handle = tokio::spawn(run_loop(
            socket_path,
            queue,
            Arc::clone(&counters),
            Arc::clone(&latest_stats),
            cancel.clone(),
        ));

        Self { handle: Some(handle), cancel, counters, latest_stats }
    }

    pub fn counters(&self) -> Arc<IngestCounters> {
        Arc::clone(&self.counters)
    }

    /// Shared slot holding the most recent engine stats snapshot.
    pub fn latest_stats(&self) -> Arc<Mutex<Option<StatsSnapshot>>> {
        Arc::clone(&self.latest_stats)
    }

    /// Cancel and join the task. The reader is torn down on exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run_loop(
    socket_path: PathBuf,
    queue: Arc<MpscQueue<EventRecord>>,
    counters: Arc<IngestCounters>,
    latest_stats: Arc<Mutex<Option<StatsSnapshot>>>,
    cancel: CancellationToken,
) {
    let mut reader = LineReader::new(socket_path.clone());
    info!(path = %socket_path.display(), "ingest worker started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if !reader.is_connected() {
            match reader.connect().await {
                Ok(()) => info!(path = %socket_path.display(), "connected to event socket"),
                Err(e) => {
                    debug!(error = %e, "event socket connect failed, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(CONNECT_BACKOFF) => {}
                    }
                    continue;
                }
            }
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = reader.wait(WAIT_TIMEOUT) => outcome,
        };
        if outcome == WaitOutcome::Timeout {
            continue;
        }

        match reader.fill() {
            FillOutcome::Eof => {
                warn!("event stream closed, reconnecting");
                reader.reset();
                counters.reconnects.fetch_add(1, Ordering::Relaxed);
            }
            FillOutcome::WouldBlock => {}
            FillOutcome::Data(_) => {
                while let Some(line) = reader.read_line() {
                    handle_line(&line, &queue, &counters, &latest_stats);
                }
                counters.oversized_lines.store(reader.oversized_lines(), Ordering::Relaxed);
            }
        }
    }

    info!("ingest worker stopped");
}

fn handle_line(
    line: &str,
    queue: &MpscQueue<EventRecord>,
    counters: &IngestCounters,
    latest_stats: &Mutex<Option<StatsSnapshot>>,
) {
    counters.lines.fetch_add(1, Ordering::Relaxed);
    match parse_line(line) {
        Ok(ParsedLine::Stats(snapshot)) => {
            *latest_stats.lock() = Some(snapshot);
            counters.stats_events.fetch_add(1, Ordering::Relaxed);
        }
        Ok(ParsedLine::Event(event)) => {
            counters.events.fetch_add(1, Ordering::Relaxed);
            // Drop-on-full: the queue counts refused pushes
            let _ = queue.push(event);
        }
        Ok(ParsedLine::Ignored) => {
            counters.ignored.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.parse_errors.fetch_add(1, Ordering::Relaxed);
            debug!(error = %e, "dropped unparseable event line");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
