// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable rendering of control responses.

use serde_json::Value;
use vnids_wire::Response;

use crate::CliCommand;

pub fn render(command: &CliCommand, response: &Response) {
    if !response.success {
        eprintln!("error ({}): {}", response.error_code as u8, response.error);
        if let Some(data) = &response.data {
            render_diagnostics(data);
        }
        return;
    }

    match command {
        CliCommand::Status => render_status(response),
        CliCommand::Stats => render_flat_object(response),
        CliCommand::Events { .. } => render_events(response),
        CliCommand::Rules => render_rules(response),
        CliCommand::ValidateRules => {
            println!("{}", response.message.as_deref().unwrap_or("rules valid"));
        }
        _ => {
            println!("{}", response.message.as_deref().unwrap_or("ok"));
        }
    }
}

fn render_status(response: &Response) {
    let Some(data) = &response.data else {
        println!("ok");
        return;
    };
    println!(
        "vnidsd {} — {} (uptime {}s), engine {}",
        data["version"].as_str().unwrap_or("?"),
        data["status"].as_str().unwrap_or("?"),
        data["uptime"].as_u64().unwrap_or(0),
        if data["suricata_running"].as_bool().unwrap_or(false) { "running" } else { "down" },
    );
}

fn render_flat_object(response: &Response) {
    let Some(Value::Object(map)) = &response.data else {
        return;
    };
    let width = map.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in map {
        println!("{key:width$}  {value}");
    }
}

fn render_events(response: &Response) {
    let Some(data) = &response.data else {
        return;
    };
    let Some(events) = data["events"].as_array() else {
        return;
    };
    if events.is_empty() {
        println!("no events");
        return;
    }
    for event in events {
        println!(
            "#{} {} [{}] {} {}:{} -> {}:{} sid={} {}",
            event["ordinal"],
            event["ts_secs"],
            event["severity"].as_str().unwrap_or("?"),
            event["protocol"].as_str().unwrap_or("?"),
            event["src"]["addr"].as_str().unwrap_or("?"),
            event["src"]["port"],
            event["dst"]["addr"].as_str().unwrap_or("?"),
            event["dst"]["port"],
            event["signature_id"],
            event["message"].as_str().unwrap_or(""),
        );
    }
}

fn render_rules(response: &Response) {
    let Some(data) = &response.data else {
        return;
    };
    println!("rules dir: {}", data["dir"].as_str().unwrap_or("?"));
    if let Some(files) = data["files"].as_array() {
        for file in files {
            println!(
                "  {}  {} rules ({} bytes)",
                file["name"].as_str().unwrap_or("?"),
                file["rules"],
                file["size_bytes"],
            );
        }
    }
    println!("total: {} rules", data["total_rules"]);
}

fn render_diagnostics(data: &Value) {
    if let Some(errors) = data["errors"].as_array() {
        for error in errors {
            eprintln!(
                "  {}:{}  {}",
                error["file"].as_str().unwrap_or("?"),
                error["line"],
                error["reason"].as_str().unwrap_or("?"),
            );
        }
    }
}
