// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Request from a CLI client to the daemon.
///
/// `command` is dispatched against the closed [`Command`] set; unknown values
/// yield a coded error response without dropping the session. `params`, when
/// present, must be a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), params: None }
    }

    pub fn with_params(command: impl Into<String>, params: serde_json::Value) -> Self {
        Self { command: command.into(), params: Some(params) }
    }

    /// Resolve the command against the closed set.
    pub fn command(&self) -> Option<Command> {
        Command::parse(&self.command)
    }

    /// The params object, when present and actually an object.
    pub fn params_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match &self.params {
            Some(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// True when `params` is present but not a JSON object. Such requests are
    /// rejected with `invalid_params` before dispatch.
    pub fn params_malformed(&self) -> bool {
        matches!(&self.params, Some(value) if !value.is_object())
    }
}

/// The closed control command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    GetStats,
    ReloadRules,
    SetConfig,
    Shutdown,
    ListRules,
    ListEvents,
    ValidateRules,
}

impl Command {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "status" => Some(Command::Status),
            "get_stats" => Some(Command::GetStats),
            "reload_rules" => Some(Command::ReloadRules),
            "set_config" => Some(Command::SetConfig),
            "shutdown" => Some(Command::Shutdown),
            "list_rules" => Some(Command::ListRules),
            "list_events" => Some(Command::ListEvents),
            "validate_rules" => Some(Command::ValidateRules),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::GetStats => "get_stats",
            Command::ReloadRules => "reload_rules",
            Command::SetConfig => "set_config",
            Command::Shutdown => "shutdown",
            Command::ListRules => "list_rules",
            Command::ListEvents => "list_events",
            Command::ValidateRules => "validate_rules",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
