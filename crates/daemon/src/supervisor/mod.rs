// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detection engine supervisor.
//!
//! Owns the lifecycle of the external detection subprocess: launch, liveness
//! probing, bounded-retry exponential-backoff restart, graceful stop, and
//! rule reload. State machine:
//!
//! ```text
//! Stopped → Starting → Running ↔ Restarting → (Running | Failed)
//! ```
//!
//! Failed is terminal until an explicit `start`; the daemon keeps serving the
//! control plane in that state and reports `degraded`.

mod process;

pub use process::{
    EngineCommand, EngineProcess, EngineSpawner, ProcessHandle, SystemSpawner, RELOAD_SIGNAL,
    STOP_TIMEOUT,
};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vnids_core::Config;

/// Supervisor errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn engine: {source}")]
    Spawn { source: std::io::Error },

    #[error("Failed to open engine log {path}: {source}")]
    EngineLog { path: PathBuf, source: std::io::Error },

    #[error("Failed to signal pid {pid}: {errno}")]
    Signal { pid: i32, errno: nix::errno::Errno },

    #[error("Engine is not running")]
    NotRunning,
}

/// Supervisor finite state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Restarting,
    Failed,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Failed => "failed",
        }
    }
}

/// Launch and watchdog parameters.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub command: EngineCommand,
    pub check_interval: Duration,
    pub max_restart_attempts: u32,
    pub auto_restart: bool,
}

impl SupervisorConfig {
    /// Derive from the daemon configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: EngineCommand {
                binary: config.suricata.binary.clone(),
                config: config.suricata.config.clone(),
                event_socket: config.event_socket_path(),
                rules_dir: Some(config.suricata.rules_dir.clone()),
                log_dir: Some(config.suricata.log_dir.clone()),
                interfaces: config.interfaces(),
            },
            check_interval: Duration::from_millis(config.watchdog.check_interval_ms),
            max_restart_attempts: config.watchdog.max_restart_attempts,
            auto_restart: config.watchdog.auto_restart,
        }
    }
}

/// Point-in-time supervisor status for the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub pid: Option<i32>,
    pub restart_count: u32,
    pub restarts_total: u64,
    pub launch_errors: u64,
    pub engine_uptime_secs: u64,
}

struct State {
    state: SupervisorState,
    process: Option<Box<dyn ProcessHandle>>,
    restart_count: u32,
    last_start: Option<Instant>,
    last_stop: Option<Instant>,
    /// Set after a relaunch; cleared (with the restart counter) once a probe
    /// sees the child still running.
    pending_reset: bool,
}

struct Shared {
    state: Mutex<State>,
    config: Mutex<SupervisorConfig>,
    wake: Notify,
    restarts_total: AtomicU64,
    launch_errors: AtomicU64,
}

/// Supervisor handle. Shared between the orchestrator (status/stop) and its
/// own monitor task; all transitions hold the internal state mutex, which is
/// never held across an await point.
pub struct Supervisor {
    shared: Arc<Shared>,
    spawner: Arc<dyn EngineSpawner>,
    monitor: Mutex<Option<(tokio::task::JoinHandle<()>, CancellationToken)>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, spawner: Arc<dyn EngineSpawner>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    state: SupervisorState::Stopped,
                    process: None,
                    restart_count: 0,
                    last_start: None,
                    last_stop: None,
                    pending_reset: false,
                }),
                config: Mutex::new(config),
                wake: Notify::new(),
                restarts_total: AtomicU64::new(0),
                launch_errors: AtomicU64::new(0),
            }),
            spawner,
            monitor: Mutex::new(None),
        }
    }

    /// Replace the launch/watchdog parameters. Takes effect at the next
    /// monitor iteration (interval) or launch (command).
    pub fn configure(&self, config: SupervisorConfig) {
        *self.shared.config.lock() = config;
        self.shared.wake.notify_one();
    }

    /// Change only the probe interval (the `watchdog_interval` config key).
    pub fn set_check_interval(&self, interval: Duration) {
        self.shared.config.lock().check_interval = interval;
        self.shared.wake.notify_one();
    }

    /// Launch the engine and start the monitor task. No-op while a monitor
    /// is already alive.
    pub fn start(&self) {
        let mut monitor = self.monitor.lock();
        if let Some((handle, _)) = monitor.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        {
            let mut st = self.shared.state.lock();
            st.state = SupervisorState::Starting;
            st.restart_count = 0;
            st.pending_reset = false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.spawner),
            cancel.clone(),
        ));
        *monitor = Some((handle, cancel));
    }

    /// Stop the monitor, then gracefully stop the engine: SIGTERM, wait up to
    /// [`STOP_TIMEOUT`], escalate to SIGKILL. Idempotent.
    pub async fn stop(&self) {
        let taken = self.monitor.lock().take();
        if let Some((handle, cancel)) = taken {
            cancel.cancel();
            self.shared.wake.notify_waiters();
            let _ = handle.await;
        }

        let process = self.shared.state.lock().process.take();
        let Some(mut process) = process else {
            return;
        };

        let pid = process.pid();
        info!(pid, "stopping engine");
        if let Err(e) = process.signal(Signal::SIGTERM) {
            warn!(pid, error = %e, "SIGTERM delivery failed");
        }

        let deadline = Instant::now() + STOP_TIMEOUT;
        let mut exited = false;
        while Instant::now() < deadline {
            if process.poll_exit().is_some() {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if !exited {
            warn!(pid, "graceful stop timed out, sending SIGKILL");
            process.force_kill();
            for _ in 0..50 {
                if process.poll_exit().is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        let mut st = self.shared.state.lock();
        st.state = SupervisorState::Stopped;
        st.last_stop = Some(Instant::now());
        info!(pid, "engine stopped");
    }

    /// Ask the engine to reload its rules. Returns without waiting for the
    /// reload to complete.
    pub fn reload_rules(&self) -> Result<(), SupervisorError> {
        let st = self.shared.state.lock();
        match st.process.as_ref() {
            Some(process) => process.signal(RELOAD_SIGNAL),
            None => Err(SupervisorError::NotRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        let st = self.shared.state.lock();
        st.state == SupervisorState::Running && st.process.is_some()
    }

    pub fn state(&self) -> SupervisorState {
        self.shared.state.lock().state
    }

    pub fn pid(&self) -> Option<i32> {
        self.shared.state.lock().process.as_ref().map(|p| p.pid())
    }

    pub fn status(&self) -> SupervisorStatus {
        let st = self.shared.state.lock();
        SupervisorStatus {
            state: st.state,
            pid: st.process.as_ref().map(|p| p.pid()),
            restart_count: st.restart_count,
            restarts_total: self.shared.restarts_total.load(Ordering::Relaxed),
            launch_errors: self.shared.launch_errors.load(Ordering::Relaxed),
            engine_uptime_secs: match (st.state, st.last_start) {
                (SupervisorState::Running, Some(started)) => started.elapsed().as_secs(),
                _ => 0,
            },
        }
    }

    /// Nudge the monitor to probe immediately.
    pub fn poke(&self) {
        self.shared.wake.notify_one();
    }
}

/// Backoff before restart attempt `n` (1-based): `min(1000 · 2^(n−1), 60 s)`.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let ms = 1000u64.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    Duration::from_millis(ms.min(60_000))
}

enum ProbeOutcome {
    Alive,
    NoProcess,
    Exited(i32),
}

async fn monitor_loop(shared: Arc<Shared>, spawner: Arc<dyn EngineSpawner>, cancel: CancellationToken) {
    // Initial launch: Starting → Running, or Failed outright.
    if !launch(&shared, &spawner) {
        let mut st = shared.state.lock();
        st.state = SupervisorState::Failed;
        error!("initial engine launch failed");
        return;
    }

    loop {
        let interval = shared.config.lock().check_interval;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
            _ = shared.wake.notified() => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        let outcome = probe(&shared);
        let code = match outcome {
            ProbeOutcome::Alive | ProbeOutcome::NoProcess => continue,
            ProbeOutcome::Exited(code) => code,
        };
        warn!(code, "engine exited unexpectedly");

        let (auto_restart, max_attempts) = {
            let config = shared.config.lock();
            (config.auto_restart, config.max_restart_attempts)
        };
        if !auto_restart {
            continue;
        }

        if !restart_with_backoff(&shared, &spawner, &cancel, max_attempts).await {
            if cancel.is_cancelled() {
                break;
            }
            let mut st = shared.state.lock();
            st.state = SupervisorState::Failed;
            error!(max_attempts, "restart budget exhausted, supervisor failed");
            break;
        }
    }
}

fn launch(shared: &Shared, spawner: &Arc<dyn EngineSpawner>) -> bool {
    let command = shared.config.lock().command.clone();
    match spawner.spawn(&command) {
        Ok(process) => {
            let mut st = shared.state.lock();
            st.process = Some(process);
            st.state = SupervisorState::Running;
            st.last_start = Some(Instant::now());
            true
        }
        Err(e) => {
            shared.launch_errors.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "engine launch failed");
            false
        }
    }
}

fn probe(shared: &Shared) -> ProbeOutcome {
    let mut st = shared.state.lock();
    let Some(process) = st.process.as_mut() else {
        return ProbeOutcome::NoProcess;
    };
    match process.poll_exit() {
        Some(code) => {
            st.process = None;
            st.state = SupervisorState::Stopped;
            st.last_stop = Some(Instant::now());
            ProbeOutcome::Exited(code)
        }
        None => {
            // A relaunch that survived until this probe earns a counter reset
            if st.pending_reset {
                st.pending_reset = false;
                st.restart_count = 0;
                info!("engine stable after restart, counter reset");
            }
            ProbeOutcome::Alive
        }
    }
}

/// Retry launches with exponential backoff until one sticks or the budget is
/// spent. Returns false when the budget is exhausted (or cancelled).
async fn restart_with_backoff(
    shared: &Arc<Shared>,
    spawner: &Arc<dyn EngineSpawner>,
    cancel: &CancellationToken,
    max_attempts: u32,
) -> bool {
    loop {
        let attempt = {
            let mut st = shared.state.lock();
            if st.restart_count >= max_attempts {
                return false;
            }
            st.restart_count += 1;
            st.state = SupervisorState::Restarting;
            st.restart_count
        };
        shared.restarts_total.fetch_add(1, Ordering::Relaxed);

        let delay = backoff_delay(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "restarting engine");
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }

        if launch(shared, spawner) {
            shared.state.lock().pending_reset = true;
            return true;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
