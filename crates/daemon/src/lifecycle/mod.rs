// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup order, shutdown order, pid file.
//!
//! Components start leaves-up (store, queue, dispatcher, ingest, supervisor,
//! control server) and tear down in the reverse dependency order: control →
//! supervisor → dispatcher (drain) → ingest → store.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

use vnids_core::{Config, ConfigError, LogLevel};
use vnids_queue::MpscQueue;
use vnids_storage::{EventStore, StoreError};

use crate::control::{ControlCtx, ControlError, ControlServer};
use crate::dispatch::Dispatcher;
use crate::ingest::IngestWorker;
use crate::logging::LogHandle;
use crate::supervisor::Supervisor;

/// Lifecycle errors. All of these are fatal at startup (exit code 1).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to acquire pid lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Config keys changed at runtime via `set_config`. Keys without a live
/// apply path take effect at the next start of the owning component.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub log_level: Option<LogLevel>,
    pub eve_socket: Option<PathBuf>,
    pub rules_dir: Option<PathBuf>,
    pub watchdog_interval_ms: Option<u64>,
    pub stats_interval_s: Option<u64>,
}

/// Filesystem locations derived from the configuration.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub control_socket: PathBuf,
    pub event_socket: PathBuf,
    pub pid_file: PathBuf,
    pub database: PathBuf,
    pub log_dir: PathBuf,
}

impl DaemonPaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            control_socket: config.control_socket_path(),
            event_socket: config.event_socket_path(),
            pid_file: config.general.pid_file.clone(),
            database: config.storage.database.clone(),
            log_dir: config.suricata.log_dir.clone(),
        }
    }
}

/// The running daemon: owns every component handle exclusively.
pub struct DaemonState {
    pub paths: DaemonPaths,
    // NOTE(lifetime): held to keep the exclusive pid lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    store: Arc<EventStore>,
    queue: Arc<MpscQueue<vnids_core::EventRecord>>,
    dispatcher: Arc<Dispatcher>,
    ingest: Option<IngestWorker>,
    supervisor: Arc<Supervisor>,
    control: ControlServer,
    shutdown: Arc<Notify>,
    pub start_time: Instant,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState").finish_non_exhaustive()
    }
}

impl DaemonState {
    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.supervisor)
    }

    pub fn store(&self) -> Arc<EventStore> {
        Arc::clone(&self.store)
    }

    pub fn queue(&self) -> Arc<MpscQueue<vnids_core::EventRecord>> {
        Arc::clone(&self.queue)
    }

    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Tear everything down in dependency order and remove the pid file.
    pub async fn shutdown(mut self) {
        info!("shutting down daemon");

        self.control.stop().await;
        self.supervisor.stop().await;
        self.dispatcher.stop().await;
        if let Some(ingest) = self.ingest.take() {
            ingest.stop().await;
        }
        self.store.close();

        if self.paths.pid_file.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.pid_file) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("daemon shutdown complete");
    }
}

/// Full daemon run: start components, serve until a shutdown signal, tear
/// down.
pub async fn run(config: Config, log_handle: Option<LogHandle>) -> Result<(), LifecycleError> {
    let state = startup(config, log_handle).await?;
    state.supervisor().start();
    info!(version = crate::env::VERSION, "vnidsd ready");

    wait_for_shutdown(&state.shutdown_signal()).await;
    state.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown(shutdown: &Notify) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            None
        }
    };

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested via control plane"),
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = async {
            match sigterm.as_mut() {
                Some(sigterm) => { sigterm.recv().await; }
                None => std::future::pending::<()>().await,
            }
        } => info!("SIGTERM received"),
    }
}

/// Build the shared handler context. Separated so control tests can assemble
/// one around fakes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn control_ctx(
    config: Config,
    supervisor: Arc<Supervisor>,
    store: Arc<EventStore>,
    queue: Arc<MpscQueue<vnids_core::EventRecord>>,
    ingest: &IngestWorker,
    dispatcher: Arc<Dispatcher>,
    log_handle: Option<LogHandle>,
    shutdown: Arc<Notify>,
) -> ControlCtx {
    ControlCtx {
        config,
        supervisor,
        store,
        queue,
        ingest: ingest.counters(),
        latest_stats: ingest.latest_stats(),
        dispatcher,
        overrides: Arc::new(Mutex::new(RuntimeOverrides::default())),
        log_handle,
        start_time: Instant::now(),
        shutdown,
        shutting_down: std::sync::atomic::AtomicBool::new(false),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
