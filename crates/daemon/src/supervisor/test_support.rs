// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process/spawner pair for supervisor and control tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use nix::sys::signal::Signal;
use parking_lot::Mutex;

use super::{EngineCommand, EngineSpawner, ProcessHandle, SupervisorConfig, SupervisorError};

/// Shared control block for a [`FakeProcess`].
#[derive(Default)]
pub(crate) struct FakeProcessState {
    pub exited: AtomicBool,
    pub exit_code: AtomicU32,
    pub signals: Mutex<Vec<Signal>>,
    pub killed: AtomicBool,
}

impl FakeProcessState {
    pub fn exit(&self, code: u32) {
        self.exit_code.store(code, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct FakeProcess {
    pub state: Arc<FakeProcessState>,
    pub pid: i32,
    reaped: bool,
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn poll_exit(&mut self) -> Option<i32> {
        if self.reaped {
            return Some(self.state.exit_code.load(Ordering::SeqCst) as i32);
        }
        if self.state.exited.load(Ordering::SeqCst) || self.state.killed.load(Ordering::SeqCst) {
            self.reaped = true;
            return Some(self.state.exit_code.load(Ordering::SeqCst) as i32);
        }
        None
    }

    fn signal(&self, signal: Signal) -> Result<(), SupervisorError> {
        self.state.signals.lock().push(signal);
        // A graceful-stop signal takes the fake down immediately
        if signal == Signal::SIGTERM {
            self.state.exit(0);
        }
        Ok(())
    }

    fn force_kill(&mut self) {
        self.state.killed.store(true, Ordering::SeqCst);
    }
}

/// Spawner producing [`FakeProcess`]es, optionally failing the first N spawns.
#[derive(Default)]
pub(crate) struct FakeSpawner {
    pub fail_spawns: AtomicU32,
    /// When set, every spawned process has already exited with code 1.
    pub instant_exit: AtomicBool,
    pub spawned: AtomicU32,
    pub processes: Mutex<Vec<Arc<FakeProcessState>>>,
}

impl FakeSpawner {
    pub fn failing(n: u32) -> Self {
        let spawner = Self::default();
        spawner.fail_spawns.store(n, Ordering::SeqCst);
        spawner
    }

    pub fn crashing() -> Self {
        let spawner = Self::default();
        spawner.instant_exit.store(true, Ordering::SeqCst);
        spawner
    }

    /// Control block of the most recently spawned process.
    pub fn last_process(&self) -> Option<Arc<FakeProcessState>> {
        self.processes.lock().last().cloned()
    }

    pub fn spawn_count(&self) -> u32 {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl EngineSpawner for FakeSpawner {
    fn spawn(&self, _command: &EngineCommand) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let seq = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_spawns.load(Ordering::SeqCst) >= seq {
            return Err(SupervisorError::Spawn {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            });
        }
        let state = Arc::new(FakeProcessState::default());
        if self.instant_exit.load(Ordering::SeqCst) {
            state.exit(1);
        }
        self.processes.lock().push(Arc::clone(&state));
        Ok(Box::new(FakeProcess { state, pid: 40_000 + seq as i32, reaped: false }))
    }
}

/// Supervisor config with short intervals suitable for tests.
pub(crate) fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        command: EngineCommand {
            binary: PathBuf::from("/usr/bin/true"),
            config: PathBuf::from("/etc/engine.yaml"),
            event_socket: PathBuf::from("/tmp/eve.sock"),
            rules_dir: None,
            log_dir: None,
            interfaces: vec!["eth0".to_string()],
        },
        check_interval: std::time::Duration::from_millis(10),
        max_restart_attempts: 3,
        auto_restart: true,
    }
}
