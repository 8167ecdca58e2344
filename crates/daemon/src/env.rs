// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Daemon version reported by `status`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the config file path: `VNIDS_CONFIG` > `/etc/vnids/vnids.conf`.
pub fn config_path() -> PathBuf {
    match std::env::var("VNIDS_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("/etc/vnids/vnids.conf"),
    }
}

/// Write timeout for control-plane responses.
pub fn ipc_timeout() -> Duration {
    std::env::var("VNIDS_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Marker set on the re-executed child when daemonizing.
pub const DAEMONIZED_ENV: &str = "VNIDS_DAEMONIZED";
