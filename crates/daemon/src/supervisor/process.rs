// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin subprocess abstraction the supervisor depends on.
//!
//! The monitor only ever needs four things from a child: its pid, a
//! non-blocking exit probe, signal delivery, and a hard kill. Keeping those
//! behind a trait lets the state machine run against fakes in tests.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

use super::SupervisorError;

/// Signal used to request a rule reload from the engine.
pub const RELOAD_SIGNAL: Signal = Signal::SIGUSR2;

/// Graceful-stop budget before escalating to SIGKILL.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// A running detection subprocess.
pub trait ProcessHandle: Send {
    fn pid(&self) -> i32;

    /// Probe for exit without blocking. `Some(code)` reaps the child and
    /// reports its exit code (-1 when killed by signal).
    fn poll_exit(&mut self) -> Option<i32>;

    /// Deliver a signal to the child.
    fn signal(&self, signal: Signal) -> Result<(), SupervisorError>;

    /// Hard kill. Best effort; the next `poll_exit` reaps.
    fn force_kill(&mut self);
}

/// Spawns detection subprocesses. Injectable so the monitor loop is testable.
pub trait EngineSpawner: Send + Sync {
    fn spawn(&self, command: &EngineCommand) -> Result<Box<dyn ProcessHandle>, SupervisorError>;
}

/// Fully resolved launch parameters for the engine.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub binary: PathBuf,
    pub config: PathBuf,
    pub event_socket: PathBuf,
    pub rules_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub interfaces: Vec<String>,
}

impl EngineCommand {
    /// Build the engine argument vector: config, EVE socket overrides,
    /// optional rules/log directories, one `-i` per interface, workers
    /// runmode.
    pub fn argv(&self) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            self.config.display().to_string(),
            "--set".to_string(),
            "outputs.1.eve-log.filetype=unix_stream".to_string(),
            "--set".to_string(),
            format!("outputs.1.eve-log.filename={}", self.event_socket.display()),
        ];
        if let Some(rules_dir) = &self.rules_dir {
            args.push("--set".to_string());
            args.push(format!("default-rule-path={}", rules_dir.display()));
        }
        if let Some(log_dir) = &self.log_dir {
            args.push("-l".to_string());
            args.push(log_dir.display().to_string());
        }
        for interface in &self.interfaces {
            args.push("-i".to_string());
            args.push(interface.clone());
        }
        args.push("--runmode".to_string());
        args.push("workers".to_string());
        args
    }
}

/// Real subprocess backed by tokio.
pub struct EngineProcess {
    child: tokio::process::Child,
    pid: i32,
}

impl ProcessHandle for EngineProcess {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn poll_exit(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            Ok(None) => None,
            Err(e) => {
                warn!(pid = self.pid, error = %e, "exit probe failed, treating child as gone");
                Some(-1)
            }
        }
    }

    fn signal(&self, signal: Signal) -> Result<(), SupervisorError> {
        kill(Pid::from_raw(self.pid), signal)
            .map_err(|errno| SupervisorError::Signal { pid: self.pid, errno })
    }

    fn force_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(pid = self.pid, error = %e, "force kill failed");
        }
    }
}

/// Spawner for the real engine binary.
///
/// The child's stdout/stderr are appended to `${log_dir}/suricata.log` when a
/// log directory is configured, otherwise discarded.
pub struct SystemSpawner;

impl EngineSpawner for SystemSpawner {
    fn spawn(&self, command: &EngineCommand) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let (stdout, stderr) = match &command.log_dir {
            Some(log_dir) => {
                let log_path = log_dir.join("suricata.log");
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)
                    .map_err(|source| SupervisorError::EngineLog { path: log_path, source })?;
                let clone = file
                    .try_clone()
                    .map_err(|source| SupervisorError::Spawn { source })?;
                (Stdio::from(file), Stdio::from(clone))
            }
            None => (Stdio::null(), Stdio::null()),
        };

        let mut child = tokio::process::Command::new(&command.binary)
            .args(command.argv())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            // Safety net for the destructor path; normal stop is explicit
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn { source })?;

        let pid = child.id().map(|id| id as i32).unwrap_or(-1);
        info!(pid, binary = %command.binary.display(), "engine process spawned");
        Ok(Box::new(EngineProcess { child, pid }))
    }
}
