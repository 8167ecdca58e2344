// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use tokio::sync::Notify;
use tracing::info;

use vnids_core::Config;
use vnids_queue::MpscQueue;
use vnids_storage::EventStore;

use super::{control_ctx, DaemonPaths, DaemonState, LifecycleError};
use crate::control::ControlServer;
use crate::dispatch::Dispatcher;
use crate::ingest::IngestWorker;
use crate::logging::LogHandle;
use crate::supervisor::{Supervisor, SupervisorConfig, SystemSpawner};

/// Start the daemon's components in dependency order.
///
/// Any error here is fatal; `main` reports it on stderr and exits 1.
pub async fn startup(
    config: Config,
    log_handle: Option<LogHandle>,
) -> Result<DaemonState, LifecycleError> {
    let paths = DaemonPaths::from_config(&config);

    // 1. Startup validation: ranges were checked at load; the engine paths
    //    must exist before anything is created on disk.
    config.validate_engine_paths()?;

    // 2. Create directories for sockets, database, logs, pid file
    for dir in [
        Some(config.ipc.socket_dir.as_path()),
        paths.database.parent(),
        Some(paths.log_dir.as_path()),
        paths.pid_file.parent(),
    ]
    .into_iter()
    .flatten()
    {
        std::fs::create_dir_all(dir)?;
    }

    // 3. Acquire the pid lock before touching shared state. Open without
    //    truncate so a running daemon's pid is not wiped by a failed start.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.pid_file)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 4. Open the store (fatal on failure) and apply the configured cap
    let store = Arc::new(EventStore::open(&paths.database)?);
    store.set_cap(config.storage.max_events)?;

    // 5. Event queue between ingest and dispatcher
    let queue = Arc::new(MpscQueue::new(config.ipc.event_buffer_size as usize));

    // 6. Dispatcher consumes the queue into the store
    let dispatcher = Arc::new(Dispatcher::new());
    if let Err(e) = dispatcher.start(Arc::clone(&queue), Arc::clone(&store)) {
        // Fresh dispatcher; start can only fail if already started
        tracing::error!(error = %e, "dispatcher start failed");
    }

    // 7. Ingest worker connects to the engine's event socket (retrying until
    //    the supervisor has the engine up)
    let ingest = IngestWorker::start(paths.event_socket.clone(), Arc::clone(&queue));

    // 8. Supervisor (engine launch happens on `start()`)
    let supervisor = Arc::new(Supervisor::new(
        SupervisorConfig::from_config(&config),
        Arc::new(SystemSpawner),
    ));

    // 9. Control server binds last, once everything it exposes exists
    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(control_ctx(
        config.clone(),
        Arc::clone(&supervisor),
        Arc::clone(&store),
        Arc::clone(&queue),
        &ingest,
        Arc::clone(&dispatcher),
        log_handle,
        Arc::clone(&shutdown),
    ));
    let control = ControlServer::start(paths.control_socket.clone(), ctx)?;

    info!(
        control = %paths.control_socket.display(),
        events = %paths.event_socket.display(),
        database = %paths.database.display(),
        "daemon started"
    );

    Ok(DaemonState {
        paths,
        lock_file,
        store,
        queue,
        dispatcher,
        ingest: Some(ingest),
        supervisor,
        control,
        shutdown,
        start_time: Instant::now(),
    })
}
