// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vnids: CLI client for the vnidsd control plane.

mod client;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use vnids_core::Config;
use vnids_wire::Request;

#[derive(Parser)]
#[command(name = "vnids", version, about = "Control client for vnidsd")]
struct Cli {
    /// Path to the daemon config file (for socket discovery)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Control socket path (overrides config discovery)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Daemon and engine status
    Status,
    /// Merged runtime counters
    Stats,
    /// Recent events from the store
    Events {
        /// Maximum rows to return
        #[arg(long, default_value_t = 20)]
        limit: u64,
        /// Only events at least this severe (critical/high/medium/low/info)
        #[arg(long)]
        severity: Option<String>,
    },
    /// Signal the engine to reload its rules
    ReloadRules,
    /// Change a runtime config key
    SetConfig { key: String, value: String },
    /// List rule files
    Rules,
    /// Structurally validate rule files
    ValidateRules,
    /// Stop the daemon
    Shutdown,
}

impl CliCommand {
    fn request(&self) -> Request {
        match self {
            CliCommand::Status => Request::new("status"),
            CliCommand::Stats => Request::new("get_stats"),
            CliCommand::Events { limit, severity } => {
                let mut params = json!({ "limit": limit });
                if let Some(severity) = severity {
                    params["min_severity"] = json!(severity);
                }
                Request::with_params("list_events", params)
            }
            CliCommand::ReloadRules => Request::new("reload_rules"),
            CliCommand::SetConfig { key, value } => {
                Request::with_params("set_config", json!({ "key": key, "value": value }))
            }
            CliCommand::Rules => Request::new("list_rules"),
            CliCommand::ValidateRules => Request::new("validate_rules"),
            CliCommand::Shutdown => Request::new("shutdown"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = resolve_socket(&cli)?;

    let response = client::send(&socket, &cli.command.request())
        .await
        .with_context(|| format!("daemon not reachable at {}", socket.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        output::render(&cli.command, &response);
    }

    if response.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn resolve_socket(cli: &Cli) -> Result<PathBuf> {
    if let Some(socket) = &cli.socket {
        return Ok(socket.clone());
    }
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => {
            let default = vnids_daemon_config_path();
            if default.exists() {
                Config::load(&default)?
            } else {
                Config::from_env()?
            }
        }
    };
    Ok(config.control_socket_path())
}

/// Same discovery order as the daemon: `VNIDS_CONFIG` then the system path.
fn vnids_daemon_config_path() -> PathBuf {
    match std::env::var("VNIDS_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("/etc/vnids/vnids.conf"),
    }
}
