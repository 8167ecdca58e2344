// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control server: local length-prefixed request/response plane.
//!
//! Accepts up to [`MAX_SESSIONS`] concurrent CLI clients on a Unix socket.
//! Each session loops prefix → body → dispatch → respond; a declared length
//! over the frame cap closes the session without a response. Handlers are
//! bounded store/supervisor calls and never block the accept path.

mod handlers;
mod rules;

pub use handlers::dispatch;

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::net::{unix::OwnedWriteHalf, UnixListener};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vnids_core::{Config, EventRecord, StatsSnapshot};
use vnids_queue::MpscQueue;
use vnids_storage::EventStore;
use vnids_wire::{ErrorCode, ProtocolError, Request, Response};

use crate::dispatch::Dispatcher;
use crate::env::ipc_timeout;
use crate::ingest::IngestCounters;
use crate::lifecycle::RuntimeOverrides;
use crate::logging::LogHandle;
use crate::supervisor::Supervisor;

/// Concurrent client session limit.
pub const MAX_SESSIONS: usize = 32;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to bind control socket at {path}: {source}")]
    BindFailed { path: PathBuf, source: std::io::Error },

    #[error("Failed to set control socket permissions: {0}")]
    Permissions(#[from] std::io::Error),
}

/// Shared daemon context for all request handlers.
pub struct ControlCtx {
    pub config: Config,
    pub supervisor: Arc<Supervisor>,
    pub store: Arc<EventStore>,
    pub queue: Arc<MpscQueue<EventRecord>>,
    pub ingest: Arc<IngestCounters>,
    pub latest_stats: Arc<Mutex<Option<StatsSnapshot>>>,
    pub dispatcher: Arc<Dispatcher>,
    pub overrides: Arc<Mutex<RuntimeOverrides>>,
    pub log_handle: Option<LogHandle>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    pub shutting_down: AtomicBool,
}

/// Server counters surfaced via `stats()`.
#[derive(Default)]
pub struct ControlCounters {
    pub connections: AtomicU64,
    pub requests: AtomicU64,
    pub errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ControlStats {
    pub connections: u64,
    pub requests: u64,
    pub errors: u64,
}

impl ControlCounters {
    pub fn snapshot(&self) -> ControlStats {
        ControlStats {
            connections: self.connections.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Control server handle.
pub struct ControlServer {
    cancel: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    counters: Arc<ControlCounters>,
    path: PathBuf,
}

impl ControlServer {
    /// Bind the control socket (0660) and spawn the accept loop.
    pub fn start(path: PathBuf, ctx: Arc<ControlCtx>) -> Result<Self, ControlError> {
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|source| ControlError::BindFailed { path: path.clone(), source })?;
        }
        let listener = UnixListener::bind(&path)
            .map_err(|source| ControlError::BindFailed { path: path.clone(), source })?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o660))?;

        let cancel = CancellationToken::new();
        let counters = Arc::new(ControlCounters::default());
        let handle =
            tokio::spawn(accept_loop(listener, ctx, Arc::clone(&counters), cancel.clone()));

        info!(path = %path.display(), "control server listening");
        Ok(Self { cancel, handle: Mutex::new(Some(handle)), counters, path })
    }

    /// Stop accepting, tear down sessions, remove the socket file.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(error = %e, "failed to remove control socket");
            }
        }
    }

    pub fn stats(&self) -> ControlStats {
        self.counters.snapshot()
    }

    pub fn counters(&self) -> Arc<ControlCounters> {
        Arc::clone(&self.counters)
    }
}

async fn accept_loop(
    listener: UnixListener,
    ctx: Arc<ControlCtx>,
    counters: Arc<ControlCounters>,
    cancel: CancellationToken,
) {
    let sessions = Arc::new(AtomicUsize::new(0));
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, _)) => {
                counters.connections.fetch_add(1, Ordering::Relaxed);

                if sessions.load(Ordering::Acquire) >= MAX_SESSIONS {
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    warn!("control session limit reached, refusing client");
                    let (_, writer) = stream.into_split();
                    tokio::spawn(refuse_session(writer));
                    continue;
                }

                sessions.fetch_add(1, Ordering::AcqRel);
                let ctx = Arc::clone(&ctx);
                let counters = Arc::clone(&counters);
                let sessions = Arc::clone(&sessions);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    handle_session(stream, &ctx, &counters, cancel).await;
                    sessions.fetch_sub(1, Ordering::AcqRel);
                });
            }
            Err(e) => error!("control accept error: {}", e),
        }
    }
}

/// Best-effort coded refusal for over-limit clients.
async fn refuse_session(mut writer: OwnedWriteHalf) {
    let response = Response::error(ErrorCode::ResourceExhausted, "Too many control clients");
    let _ = vnids_wire::write_response(&mut writer, &response, ipc_timeout()).await;
}

async fn handle_session(
    stream: tokio::net::UnixStream,
    ctx: &ControlCtx,
    counters: &ControlCounters,
    cancel: CancellationToken,
) {
    let (mut reader, mut writer) = stream.into_split();
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = vnids_wire::read_message(&mut reader) => result,
        };

        let body = match result {
            Ok(body) => body,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("control client disconnected");
                break;
            }
            Err(ProtocolError::TooLarge { size }) => {
                // Framing violation: drop the session without a response
                counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(size, "oversized control message, closing session");
                break;
            }
            Err(e) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "control read error, closing session");
                break;
            }
        };

        counters.requests.fetch_add(1, Ordering::Relaxed);
        let (response, notify_shutdown) = match vnids_wire::decode::<Request>(&body) {
            Ok(request) => {
                debug!(command = %request.command, "control request");
                dispatch(ctx, &request)
            }
            Err(_) => {
                (Response::error(ErrorCode::InvalidParams, "Malformed request JSON"), false)
            }
        };

        if let Err(e) = vnids_wire::write_response(&mut writer, &response, ipc_timeout()).await {
            counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "control write error, closing session");
            break;
        }

        if notify_shutdown {
            ctx.shutdown.notify_one();
        }
    }
}

#[cfg(test)]
pub(crate) fn test_ctx(dir: &std::path::Path) -> ControlCtx {
    use crate::supervisor::test_support::{fast_config, FakeSpawner};

    let mut config = Config::default();
    config.suricata.rules_dir = dir.join("rules");
    std::fs::create_dir_all(&config.suricata.rules_dir).unwrap();

    let store = Arc::new(EventStore::open(&dir.join("events.db")).unwrap());
    let supervisor =
        Arc::new(Supervisor::new(fast_config(), Arc::new(FakeSpawner::default())));

    ControlCtx {
        config,
        supervisor,
        store,
        queue: Arc::new(MpscQueue::new(64)),
        ingest: Arc::new(IngestCounters::default()),
        latest_stats: Arc::new(Mutex::new(None)),
        dispatcher: Arc::new(Dispatcher::new()),
        overrides: Arc::new(Mutex::new(RuntimeOverrides::default())),
        log_handle: None,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
        shutting_down: AtomicBool::new(false),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
