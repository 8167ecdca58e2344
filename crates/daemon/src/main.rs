// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vnidsd: supervisory control plane for the detection engine.

use std::path::PathBuf;
use std::process::ExitCode;

use vnids_core::Config;
use vnids_daemon::{env, logging};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = env::config_path();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = PathBuf::from(path),
                None => {
                    eprintln!("vnidsd: {arg} requires a path");
                    return ExitCode::FAILURE;
                }
            },
            "-V" | "--version" => {
                println!("vnidsd {}", env::VERSION);
                return ExitCode::SUCCESS;
            }
            "-h" | "--help" => {
                println!("Usage: vnidsd [-c CONFIG]");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("vnidsd: unknown argument '{other}'");
                return ExitCode::FAILURE;
            }
        }
    }

    // Config file is optional: defaults plus VNIDS_* env overrides apply
    let config = if config_path.exists() {
        Config::load(&config_path)
    } else {
        Config::from_env()
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vnidsd: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Fork to background before the runtime exists
    if config.general.daemonize && std::env::var(env::DAEMONIZED_ENV).is_err() {
        return match daemonize() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("vnidsd: daemonize failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // Detached child: become its own session leader
    if std::env::var(env::DAEMONIZED_ENV).is_ok() {
        let _ = nix::unistd::setsid();
    }

    let (log_handle, _log_guard) = if config.general.daemonize {
        if let Err(e) = std::fs::create_dir_all(&config.suricata.log_dir) {
            eprintln!("vnidsd: cannot create log dir {}: {e}", config.suricata.log_dir.display());
            return ExitCode::FAILURE;
        }
        logging::init(config.general.log_level, Some(config.suricata.log_dir.as_path()))
    } else {
        logging::init(config.general.log_level, None)
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("vnidsd: runtime init failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(vnids_daemon::run(config, Some(log_handle))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vnidsd: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Detach by re-executing ourselves with stdio on /dev/null; the child
/// starts its own session. The parent returns immediately.
fn daemonize() -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::Command::new(exe)
        .args(args)
        .env(env::DAEMONIZED_ENV, "1")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}
