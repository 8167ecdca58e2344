// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch for the control plane.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use vnids_core::{LogLevel, Severity};
use vnids_wire::{Command, ErrorCode, Request, Response};

use super::rules;
use super::ControlCtx;
use crate::env::VERSION;
use crate::supervisor::{SupervisorError, SupervisorState};

/// Default and maximum row counts for `list_events`.
const DEFAULT_EVENT_LIMIT: u64 = 100;
const MAX_EVENT_LIMIT: u64 = 1_000;

/// Dispatch one request. The boolean asks the session to fire the shutdown
/// signal after the response has been written.
pub fn dispatch(ctx: &ControlCtx, request: &Request) -> (Response, bool) {
    if ctx.shutting_down.load(Ordering::Acquire) {
        return (
            Response::error(ErrorCode::ShutdownInProgress, "Shutdown in progress"),
            false,
        );
    }

    if request.params_malformed() {
        return (Response::error(ErrorCode::InvalidParams, "params must be an object"), false);
    }

    let Some(command) = request.command() else {
        return (
            Response::error(
                ErrorCode::InvalidCommand,
                format!("Unknown command '{}'", request.command),
            ),
            false,
        );
    };

    match command {
        Command::Status => (status(ctx), false),
        Command::GetStats => (get_stats(ctx), false),
        Command::ReloadRules => (reload_rules(ctx), false),
        Command::SetConfig => (set_config(ctx, request), false),
        Command::ListRules => (list_rules(ctx), false),
        Command::ListEvents => (list_events(ctx, request), false),
        Command::ValidateRules => (validate_rules(ctx), false),
        Command::Shutdown => {
            // Flag first, then respond; teardown starts after the response
            ctx.shutting_down.store(true, Ordering::Release);
            (Response::ok_with_message("Shutting down"), true)
        }
    }
}

fn status(ctx: &ControlCtx) -> Response {
    let degraded = ctx.supervisor.state() == SupervisorState::Failed;
    Response::ok_with_data(json!({
        "status": if degraded { "degraded" } else { "running" },
        "version": VERSION,
        "uptime": ctx.start_time.elapsed().as_secs(),
        "suricata_running": ctx.supervisor.is_running(),
    }))
}

fn get_stats(ctx: &ControlCtx) -> Response {
    let engine = ctx.supervisor.status();
    let queue = ctx.queue.stats();
    let dispatch = ctx.dispatcher.stats();
    let ingest = ctx.ingest.snapshot();
    let snapshot = ctx.latest_stats.lock().clone().unwrap_or_default();

    Response::ok_with_data(json!({
        "uptime": ctx.start_time.elapsed().as_secs(),
        "engine_state": engine.state.as_str(),
        "engine_pid": engine.pid,
        "engine_uptime": engine.engine_uptime_secs,
        "engine_restarts": engine.restarts_total,
        "engine_launch_errors": engine.launch_errors,
        "queue_pushed": queue.pushed,
        "queue_popped": queue.popped,
        "queue_dropped": queue.dropped,
        "queue_len": ctx.queue.len(),
        "events_stored": dispatch.stored,
        "store_errors": dispatch.store_errors,
        "callbacks_delivered": dispatch.delivered,
        "store_cap": ctx.store.cap(),
        "ingest_lines": ingest.lines,
        "ingest_events": ingest.events,
        "parse_errors": ingest.parse_errors,
        "reconnects": ingest.reconnects,
        "oversized_lines": ingest.oversized_lines,
        "packets_captured": snapshot.packets_captured,
        "packets_dropped": snapshot.packets_dropped,
        "bytes": snapshot.bytes,
        "alerts_total": snapshot.alerts_total,
        "flows_active": snapshot.flows_active,
        "flows_total": snapshot.flows_total,
        "memory_mb": snapshot.memory_mb,
        "engine_stats_uptime": snapshot.uptime_secs,
        "latency_usecs": snapshot.latency_usecs,
        "throughput": snapshot.throughput,
    }))
}

fn reload_rules(ctx: &ControlCtx) -> Response {
    match ctx.supervisor.reload_rules() {
        Ok(()) => Response::ok_with_message("Rule reload signaled"),
        Err(SupervisorError::NotRunning) => {
            Response::error(ErrorCode::Internal, "Engine is not running")
        }
        Err(e) => Response::error(ErrorCode::Internal, e.to_string()),
    }
}

fn set_config(ctx: &ControlCtx, request: &Request) -> Response {
    let Some(params) = request.params_object() else {
        return Response::error(ErrorCode::InvalidParams, "set_config requires params");
    };
    let Some(key) = params.get("key").and_then(Value::as_str) else {
        return Response::error(ErrorCode::InvalidParams, "missing 'key' parameter");
    };
    let Some(value) = params.get("value") else {
        return Response::error(ErrorCode::InvalidParams, "missing 'value' parameter");
    };

    match key {
        "log_level" => {
            let Some(level) = value.as_str().and_then(|s| LogLevel::parse(s).ok()) else {
                return Response::error(ErrorCode::InvalidParams, "invalid log level");
            };
            if let Some(handle) = &ctx.log_handle {
                handle.set_level(level);
            }
            ctx.overrides.lock().log_level = Some(level);
            Response::ok_with_message(format!("log_level set to {level}"))
        }
        "eve_socket" => match value.as_str() {
            Some(path) => {
                ctx.overrides.lock().eve_socket = Some(PathBuf::from(path));
                Response::ok_with_message("eve_socket recorded, applied at next ingest start")
            }
            None => Response::error(ErrorCode::InvalidParams, "eve_socket must be a string"),
        },
        "rules_dir" => match value.as_str() {
            Some(dir) => {
                ctx.overrides.lock().rules_dir = Some(PathBuf::from(dir));
                Response::ok_with_message("rules_dir updated")
            }
            None => Response::error(ErrorCode::InvalidParams, "rules_dir must be a string"),
        },
        "max_events" => {
            let Some(cap) = numeric_value(value) else {
                return Response::error(ErrorCode::InvalidParams, "max_events must be a number");
            };
            match ctx.store.set_cap(cap) {
                Ok(()) => Response::ok_with_message(format!("event cap set to {cap}")),
                Err(e) => Response::error(ErrorCode::Internal, e.to_string()),
            }
        }
        "watchdog_interval" => {
            let Some(interval_ms) = numeric_value(value) else {
                return Response::error(
                    ErrorCode::InvalidParams,
                    "watchdog_interval must be a number",
                );
            };
            if !(100..=10_000).contains(&interval_ms) {
                return Response::error(
                    ErrorCode::InvalidParams,
                    "watchdog_interval out of range (100..=10000)",
                );
            }
            ctx.supervisor.set_check_interval(Duration::from_millis(interval_ms));
            ctx.overrides.lock().watchdog_interval_ms = Some(interval_ms);
            Response::ok_with_message(format!("watchdog interval set to {interval_ms} ms"))
        }
        "stats_interval" => {
            let Some(interval_s) = numeric_value(value) else {
                return Response::error(
                    ErrorCode::InvalidParams,
                    "stats_interval must be a number",
                );
            };
            ctx.overrides.lock().stats_interval_s = Some(interval_s);
            Response::ok_with_message("stats_interval recorded, applied at next engine start")
        }
        _ => Response::error(ErrorCode::InvalidConfigKey, "Invalid config key"),
    }
}

fn list_events(ctx: &ControlCtx, request: &Request) -> Response {
    let params = request.params_object();
    let limit = params
        .and_then(|p| p.get("limit").or_else(|| p.get("max")))
        .and_then(numeric_value)
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);

    let min_severity = match params.and_then(|p| p.get("min_severity")).and_then(Value::as_str) {
        Some(name) => match severity_from_name(name) {
            Some(severity) => Some(severity),
            None => {
                return Response::error(
                    ErrorCode::InvalidParams,
                    format!("unknown severity '{name}'"),
                )
            }
        },
        None => None,
    };

    match ctx.store.query_recent(limit, min_severity) {
        Ok(events) => Response::ok_with_data(json!({
            "count": events.len(),
            "events": events,
        })),
        Err(e) => Response::error(ErrorCode::Internal, e.to_string()),
    }
}

fn list_rules(ctx: &ControlCtx) -> Response {
    match rules::list_rules(&effective_rules_dir(ctx)) {
        Ok(summary) => match serde_json::to_value(&summary) {
            Ok(data) => Response::ok_with_data(data),
            Err(e) => Response::error(ErrorCode::Internal, e.to_string()),
        },
        Err(e) => Response::error(ErrorCode::Internal, format!("rules dir unreadable: {e}")),
    }
}

fn validate_rules(ctx: &ControlCtx) -> Response {
    match rules::validate_rules(&effective_rules_dir(ctx)) {
        Ok(report) if report.is_ok() => {
            let message =
                format!("{} rules valid in {} files", report.rules_checked, report.files_checked);
            match serde_json::to_value(&report) {
                Ok(data) => Response { message: Some(message), ..Response::ok_with_data(data) },
                Err(e) => Response::error(ErrorCode::Internal, e.to_string()),
            }
        }
        Ok(report) => Response {
            success: false,
            error_code: ErrorCode::RuleParse,
            error: format!("{} invalid rule lines", report.errors.len()),
            message: None,
            data: serde_json::to_value(&report).ok(),
        },
        Err(e) => Response::error(ErrorCode::Internal, format!("rules dir unreadable: {e}")),
    }
}

fn effective_rules_dir(ctx: &ControlCtx) -> PathBuf {
    ctx.overrides
        .lock()
        .rules_dir
        .clone()
        .unwrap_or_else(|| ctx.config.suricata.rules_dir.clone())
}

/// Accept a JSON number or a numeric string.
fn numeric_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn severity_from_name(name: &str) -> Option<Severity> {
    match name.to_ascii_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "high" => Some(Severity::High),
        "medium" => Some(Severity::Medium),
        "low" => Some(Severity::Low),
        "info" => Some(Severity::Info),
        _ => None,
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
