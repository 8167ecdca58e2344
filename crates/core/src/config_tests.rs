// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config parsing, env layering, and range validation tests.
//!
//! Env-override tests run serially via a process-wide lock since they mutate
//! the process environment.

use super::*;
use std::io::Write;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_pass_validation() {
    Config::default().validate().expect("defaults must be valid");
}

#[test]
fn parses_all_sections() {
    let file = write_config(
        r#"
[general]
log_level = "debug"
pid_file = "/tmp/vnids.pid"
daemonize = true

[suricata]
binary = "/opt/suricata/bin/suricata"
config = "/opt/suricata/suricata.yaml"
rules_dir = "/opt/rules"
interface = "can0,eth1"

[ipc]
socket_dir = "/tmp/vnids"
event_buffer_size = 8192

[storage]
database = "/tmp/events.db"
retention_days = 7
max_size_mb = 64

[watchdog]
check_interval_ms = 1000
heartbeat_timeout_s = 5
max_restart_attempts = 3
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.general.log_level, LogLevel::Debug);
    assert!(config.general.daemonize);
    assert_eq!(config.suricata.binary, PathBuf::from("/opt/suricata/bin/suricata"));
    assert_eq!(config.interfaces(), vec!["can0".to_string(), "eth1".to_string()]);
    assert_eq!(config.ipc.event_buffer_size, 8192);
    assert_eq!(config.storage.retention_days, 7);
    assert_eq!(config.watchdog.check_interval_ms, 1000);
    assert_eq!(config.watchdog.max_restart_attempts, 3);
    assert_eq!(config.control_socket_path(), PathBuf::from("/tmp/vnids/api.sock"));
    assert_eq!(config.event_socket_path(), PathBuf::from("/tmp/vnids/eve.sock"));
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let file = write_config("[general]\nlog_level = \"warn\"\n");
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.general.log_level, LogLevel::Warn);
    assert_eq!(config.ipc.event_buffer_size, 4096);
    assert_eq!(config.storage.max_events, 100_000);
    assert!(config.watchdog.auto_restart);
}

#[test]
fn rejects_out_of_range_buffer_size() {
    let file = write_config("[ipc]\nevent_buffer_size = 512\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { key: "event_buffer_size", .. }));
}

#[test]
fn rejects_out_of_range_retention() {
    let file = write_config("[storage]\nretention_days = 400\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { key: "retention_days", .. }));
}

#[test]
fn rejects_out_of_range_watchdog_interval() {
    let file = write_config("[watchdog]\ncheck_interval_ms = 50\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { key: "check_interval_ms", .. }));
}

#[test]
fn rejects_unparseable_file() {
    let file = write_config("this is not toml [[[");
    assert!(matches!(Config::load(file.path()).unwrap_err(), ConfigError::Parse { .. }));
}

#[test]
fn env_overrides_win_over_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config("[general]\nlog_level = \"info\"\n[suricata]\ninterface = \"eth0\"\n");
    std::env::set_var("VNIDS_LOG_LEVEL", "trace");
    std::env::set_var("VNIDS_INTERFACE", "can0");
    std::env::set_var("VNIDS_DATABASE", "/tmp/override.db");
    let config = Config::load(file.path());
    std::env::remove_var("VNIDS_LOG_LEVEL");
    std::env::remove_var("VNIDS_INTERFACE");
    std::env::remove_var("VNIDS_DATABASE");

    let config = config.unwrap();
    assert_eq!(config.general.log_level, LogLevel::Trace);
    assert_eq!(config.interfaces(), vec!["can0".to_string()]);
    assert_eq!(config.storage.database, PathBuf::from("/tmp/override.db"));
}

#[test]
fn bad_env_log_level_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("VNIDS_LOG_LEVEL", "verbose");
    let result = Config::from_env();
    std::env::remove_var("VNIDS_LOG_LEVEL");
    assert!(matches!(result.unwrap_err(), ConfigError::BadLogLevel(_)));
}

#[test]
fn interface_list_is_capped() {
    let mut config = Config::default();
    config.suricata.interface =
        (0..32).map(|i| format!("eth{i}")).collect::<Vec<_>>().join(",");
    assert_eq!(config.interfaces().len(), MAX_INTERFACES);
}

#[test]
fn fatal_level_maps_to_error_filter() {
    assert_eq!(LogLevel::Fatal.as_filter_str(), "error");
    assert_eq!(LogLevel::parse("FATAL").unwrap(), LogLevel::Fatal);
}
