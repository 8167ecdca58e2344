// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EVE JSON parsing into the normalized event model.
//!
//! The input schema is a union keyed on `event_type`. Alerts and anomalies
//! become [`EventRecord`]s; stats events become [`StatsSnapshot`]s; flow and
//! other event types are ignored by the event path. Missing optional fields
//! default to zero/empty throughout.

use serde::Deserialize;
use thiserror::Error;

use vnids_core::{
    parse_eve_timestamp, Endpoint, EventKind, EventMetadata, EventRecord, Protocol, Severity,
    StatsSnapshot,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing event_type")]
    MissingEventType,

    #[error("Unknown event_type '{0}'")]
    UnknownEventType(String),
}

/// A successfully parsed line.
#[derive(Debug)]
pub enum ParsedLine {
    Event(EventRecord),
    Stats(StatsSnapshot),
    /// Recognized event type outside the event path (flow etc.).
    Ignored,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveEvent {
    timestamp: String,
    event_type: String,
    flow_id: Option<u64>,
    src_ip: String,
    src_port: u16,
    dest_ip: String,
    dest_port: u16,
    proto: String,
    app_proto: String,
    alert: Option<EveAlert>,
    anomaly: Option<EveAnomaly>,
    someip: Option<EveSomeIp>,
    doip: Option<EveDoIp>,
    stats: Option<EveStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveAlert {
    signature_id: u64,
    gid: u32,
    signature: String,
    severity: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveAnomaly {
    #[serde(rename = "type")]
    kind: String,
    event: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveSomeIp {
    service_id: u16,
    method_id: u16,
    message_type: u8,
    return_code: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveDoIp {
    payload_type: u16,
    source_address: u16,
    target_address: u16,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveStats {
    uptime: u64,
    latency_us: u64,
    capture: EveCapture,
    decoder: EveDecoder,
    detect: EveDetect,
    flow: EveFlow,
    flow_mgr: EveFlowMgr,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveCapture {
    kernel_packets: u64,
    kernel_drops: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveDecoder {
    pkts: u64,
    bytes: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveDetect {
    alert: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveFlow {
    total: u64,
    active: u64,
    memuse: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EveFlowMgr {
    flows_removed: u64,
}

/// Parse one NDJSON line.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let eve: EveEvent = serde_json::from_str(line)?;

    if eve.event_type.is_empty() {
        return Err(ParseError::MissingEventType);
    }

    match eve.event_type.as_str() {
        "stats" => Ok(ParsedLine::Stats(stats_snapshot(eve.stats.unwrap_or_default()))),
        "alert" | "anomaly" => Ok(ParsedLine::Event(event_record(eve))),
        "flow" | "netflow" | "drop" | "fileinfo" => Ok(ParsedLine::Ignored),
        other => Err(ParseError::UnknownEventType(other.to_string())),
    }
}

fn event_record(eve: EveEvent) -> EventRecord {
    let (ts_secs, ts_usecs) = parse_eve_timestamp(&eve.timestamp).unwrap_or((0, 0));

    // Application protocol wins over transport when recognized
    let mut protocol =
        Protocol::from_app(&eve.app_proto).unwrap_or_else(|| Protocol::from_transport(&eve.proto));

    // Automotive sub-objects promote the discriminator when their key fields
    // are populated
    let mut metadata = None;
    if let Some(someip) = &eve.someip {
        if someip.service_id != 0 || someip.method_id != 0 {
            protocol = Protocol::SomeIp;
            metadata = Some(EventMetadata::SomeIp {
                service_id: someip.service_id,
                method_id: someip.method_id,
                message_type: someip.message_type,
                return_code: someip.return_code,
            });
        }
    }
    if let Some(doip) = &eve.doip {
        if doip.payload_type != 0 {
            protocol = Protocol::DoIp;
            metadata = Some(EventMetadata::DoIp {
                payload_type: doip.payload_type,
                source_address: doip.source_address,
                target_address: doip.target_address,
            });
        }
    }

    let (kind, severity, signature_id, gid, message) = match (&eve.alert, &eve.anomaly) {
        (Some(alert), _) => (
            EventKind::Alert,
            Severity::from_priority(alert.severity),
            alert.signature_id,
            alert.gid,
            alert.signature.clone(),
        ),
        (None, Some(anomaly)) => {
            let message = if anomaly.event.is_empty() {
                anomaly.kind.clone()
            } else {
                format!("{}: {}", anomaly.kind, anomaly.event)
            };
            (EventKind::Anomaly, Severity::Medium, 0, 0, message)
        }
        // An alert line without its subobject still yields a defaulted record
        (None, None) => {
            let kind = if eve.event_type == "anomaly" { EventKind::Anomaly } else { EventKind::Alert };
            let severity = if kind == EventKind::Anomaly { Severity::Medium } else { Severity::Info };
            (kind, severity, 0, 0, String::new())
        }
    };

    EventRecord {
        id: eve.flow_id.map(|id| id.to_string()).unwrap_or_default(),
        ts_secs,
        ts_usecs,
        kind,
        severity,
        protocol,
        src: Endpoint::new(&eve.src_ip, eve.src_port),
        dst: Endpoint::new(&eve.dest_ip, eve.dest_port),
        signature_id,
        gid,
        message,
        metadata,
    }
    .clamp_limits()
}

fn stats_snapshot(stats: EveStats) -> StatsSnapshot {
    // Engines that do not report active flows directly leave `active` at
    // zero; fall back to totals minus removals
    let flows_active = if stats.flow.active != 0 {
        stats.flow.active
    } else {
        stats.flow.total.saturating_sub(stats.flow_mgr.flows_removed)
    };

    let throughput = if stats.uptime > 0 {
        stats.decoder.bytes as f64 / stats.uptime as f64
    } else {
        0.0
    };

    StatsSnapshot {
        packets_captured: stats.capture.kernel_packets,
        packets_dropped: stats.capture.kernel_drops,
        bytes: stats.decoder.bytes,
        alerts_total: stats.detect.alert,
        flows_active,
        flows_total: stats.flow.total,
        memory_mb: stats.flow.memuse / (1024 * 1024),
        uptime_secs: stats.uptime,
        latency_usecs: stats.latency_us,
        throughput,
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
