// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered daemon configuration.
//!
//! A sectioned config file (`[general] [suricata] [ipc] [storage] [watchdog]`)
//! is parsed with serde defaults for every key, then `VNIDS_*` environment
//! overrides are applied, then ranges are validated. Validation failures are
//! fatal at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum number of monitored interfaces passed to the engine.
pub const MAX_INTERFACES: usize = 16;

/// Configuration errors. All of these are startup-fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("Config value {section}.{key} = {value} out of range ({min}..={max})")]
    OutOfRange { section: &'static str, key: &'static str, value: u64, min: u64, max: u64 },

    #[error("Unknown log level '{0}' (expected trace/debug/info/warn/error/fatal)")]
    BadLogLevel(String),

    #[error("Detection binary not found: {0}")]
    MissingBinary(PathBuf),

    #[error("Detection config not found: {0}")]
    MissingEngineConfig(PathBuf),
}

/// Log verbosity. `fatal` maps onto the `error` filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(ConfigError::BadLogLevel(other.to_string())),
        }
    }

    /// Directive string for the tracing env-filter.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    pub log_level: LogLevel,
    pub pid_file: PathBuf,
    pub daemonize: bool,
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            pid_file: PathBuf::from("/var/run/vnids/vnids.pid"),
            daemonize: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Suricata {
    pub binary: PathBuf,
    pub config: PathBuf,
    pub rules_dir: PathBuf,
    /// Monitored interface names, comma-separated. At most
    /// [`MAX_INTERFACES`] are passed through to the engine.
    pub interface: String,
    pub log_dir: PathBuf,
}

impl Default for Suricata {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/bin/suricata"),
            config: PathBuf::from("/etc/suricata/suricata.yaml"),
            rules_dir: PathBuf::from("/var/lib/suricata/rules"),
            interface: String::from("eth0"),
            log_dir: PathBuf::from("/var/log/vnids"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipc {
    pub socket_dir: PathBuf,
    /// Event queue capacity between ingest and the dispatcher.
    pub event_buffer_size: u64,
}

impl Default for Ipc {
    fn default() -> Self {
        Self { socket_dir: PathBuf::from("/var/run/vnids"), event_buffer_size: 4096 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub database: PathBuf,
    pub retention_days: u64,
    pub max_size_mb: u64,
    /// Row cap for the bounded event store.
    pub max_events: u64,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            database: PathBuf::from("/var/lib/vnids/events.db"),
            retention_days: 30,
            max_size_mb: 512,
            max_events: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Watchdog {
    pub check_interval_ms: u64,
    pub heartbeat_timeout_s: u64,
    pub max_restart_attempts: u32,
    pub auto_restart: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            check_interval_ms: 5000,
            heartbeat_timeout_s: 10,
            max_restart_attempts: 5,
            auto_restart: true,
        }
    }
}

/// Full daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub suricata: Suricata,
    pub ipc: Ipc,
    pub storage: Storage,
    pub watchdog: Watchdog,
}

impl Config {
    /// Load from a config file, apply environment overrides, validate ranges.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config: Config = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VNIDS_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(level) = std::env::var("VNIDS_LOG_LEVEL") {
            self.general.log_level = LogLevel::parse(&level)?;
        }
        if let Ok(binary) = std::env::var("VNIDS_SURICATA_BINARY") {
            self.suricata.binary = PathBuf::from(binary);
        }
        if let Ok(engine_config) = std::env::var("VNIDS_SURICATA_CONFIG") {
            self.suricata.config = PathBuf::from(engine_config);
        }
        if let Ok(interface) = std::env::var("VNIDS_INTERFACE") {
            self.suricata.interface = interface;
        }
        if let Ok(socket_dir) = std::env::var("VNIDS_SOCKET_DIR") {
            self.ipc.socket_dir = PathBuf::from(socket_dir);
        }
        if let Ok(database) = std::env::var("VNIDS_DATABASE") {
            self.storage.database = PathBuf::from(database);
        }
        Ok(())
    }

    /// Range validation per the documented key table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        range("ipc", "event_buffer_size", self.ipc.event_buffer_size, 1024, 1_048_576)?;
        range("storage", "retention_days", self.storage.retention_days, 1, 365)?;
        range("storage", "max_size_mb", self.storage.max_size_mb, 1, u64::MAX)?;
        range("storage", "max_events", self.storage.max_events, 1000, 100_000_000)?;
        range("watchdog", "check_interval_ms", self.watchdog.check_interval_ms, 100, 10_000)?;
        range("watchdog", "heartbeat_timeout_s", self.watchdog.heartbeat_timeout_s, 1, 60)?;
        Ok(())
    }

    /// Check that the engine binary and its config exist on disk.
    pub fn validate_engine_paths(&self) -> Result<(), ConfigError> {
        if !self.suricata.binary.exists() {
            return Err(ConfigError::MissingBinary(self.suricata.binary.clone()));
        }
        if !self.suricata.config.exists() {
            return Err(ConfigError::MissingEngineConfig(self.suricata.config.clone()));
        }
        Ok(())
    }

    /// Path of the control-plane socket.
    pub fn control_socket_path(&self) -> PathBuf {
        self.ipc.socket_dir.join("api.sock")
    }

    /// Path of the engine's EVE event socket.
    pub fn event_socket_path(&self) -> PathBuf {
        self.ipc.socket_dir.join("eve.sock")
    }

    /// Monitored interfaces, capped at [`MAX_INTERFACES`].
    pub fn interfaces(&self) -> Vec<String> {
        self.suricata
            .interface
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(MAX_INTERFACES)
            .map(String::from)
            .collect()
    }
}

fn range(
    section: &'static str,
    key: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { section, key, value, min, max });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
