// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EVE parsing tests: field preservation, defaults, routing.

use super::*;
use vnids_core::{EventKind, EventMetadata, Protocol, Severity};
use yare::parameterized;

fn parse_event(line: &str) -> vnids_core::EventRecord {
    match parse_line(line).expect("line should parse") {
        ParsedLine::Event(event) => event,
        other => panic!("expected event, got {other:?}"),
    }
}

#[test]
fn alert_fields_are_preserved() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45.123456Z","flow_id":7421,"event_type":"alert","src_ip":"10.0.0.5","src_port":1234,"dest_ip":"10.0.0.6","dest_port":80,"proto":"TCP","alert":{"signature_id":1000001,"gid":1,"signature":"TCP SYN flood","severity":2}}"#;
    let event = parse_event(line);

    assert_eq!(event.id, "7421");
    assert_eq!(event.ts_secs, 1_768_473_045);
    assert_eq!(event.ts_usecs, 123_456);
    assert_eq!(event.kind, EventKind::Alert);
    assert_eq!(event.severity, Severity::High);
    assert_eq!(event.protocol, Protocol::Tcp);
    assert_eq!(event.src.addr, "10.0.0.5");
    assert_eq!(event.src.port, 1234);
    assert_eq!(event.dst.addr, "10.0.0.6");
    assert_eq!(event.dst.port, 80);
    assert_eq!(event.signature_id, 1_000_001);
    assert_eq!(event.gid, 1);
    assert_eq!(event.message, "TCP SYN flood");
    assert!(event.metadata.is_none());
}

#[test]
fn missing_optional_fields_default() {
    let event = parse_event(r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert"}"#);
    assert_eq!(event.id, "");
    assert_eq!(event.src.addr, "");
    assert_eq!(event.src.port, 0);
    assert_eq!(event.dst.port, 0);
    assert_eq!(event.signature_id, 0);
    assert_eq!(event.gid, 0);
    assert_eq!(event.protocol, Protocol::Unknown);
    assert_eq!(event.severity, Severity::Info);
}

#[test]
fn unparseable_timestamp_defaults_to_zero() {
    let event = parse_event(r#"{"timestamp":"whenever","event_type":"alert","alert":{"severity":1}}"#);
    assert_eq!((event.ts_secs, event.ts_usecs), (0, 0));
    assert_eq!(event.severity, Severity::Critical);
}

#[parameterized(
    p1 = { 1, Severity::Critical },
    p2 = { 2, Severity::High },
    p3 = { 3, Severity::Medium },
    p4 = { 4, Severity::Low },
    p9 = { 9, Severity::Info },
)]
fn alert_priority_mapping(priority: u32, expected: Severity) {
    let line = format!(
        r#"{{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","alert":{{"severity":{priority}}}}}"#
    );
    assert_eq!(parse_event(&line).severity, expected);
}

#[test]
fn anomaly_maps_to_medium_with_type_message() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"anomaly","src_ip":"10.0.0.9","anomaly":{"type":"decode","event":"ipv4.pkt_too_small"}}"#;
    let event = parse_event(line);
    assert_eq!(event.kind, EventKind::Anomaly);
    assert_eq!(event.severity, Severity::Medium);
    assert_eq!(event.message, "decode: ipv4.pkt_too_small");
    assert_eq!(event.signature_id, 0);
}

#[test]
fn app_proto_wins_over_transport() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","proto":"TCP","app_proto":"http","alert":{"severity":3}}"#;
    assert_eq!(parse_event(line).protocol, Protocol::Http);
}

#[test]
fn unrecognized_app_proto_keeps_transport() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","proto":"UDP","app_proto":"failed","alert":{"severity":3}}"#;
    assert_eq!(parse_event(line).protocol, Protocol::Udp);
}

#[test]
fn someip_subobject_promotes_protocol() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","proto":"UDP","alert":{"severity":2},"someip":{"service_id":4660,"method_id":32769,"message_type":2,"return_code":0}}"#;
    let event = parse_event(line);
    assert_eq!(event.protocol, Protocol::SomeIp);
    assert_eq!(
        event.metadata,
        Some(EventMetadata::SomeIp {
            service_id: 4660,
            method_id: 32769,
            message_type: 2,
            return_code: 0
        })
    );
}

#[test]
fn zeroed_someip_does_not_promote() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","proto":"UDP","alert":{"severity":2},"someip":{"service_id":0,"method_id":0}}"#;
    let event = parse_event(line);
    assert_eq!(event.protocol, Protocol::Udp);
    assert!(event.metadata.is_none());
}

#[test]
fn doip_subobject_promotes_protocol() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"alert","proto":"TCP","alert":{"severity":2},"doip":{"payload_type":32769,"source_address":3584,"target_address":4112}}"#;
    let event = parse_event(line);
    assert_eq!(event.protocol, Protocol::DoIp);
    assert!(matches!(event.metadata, Some(EventMetadata::DoIp { payload_type: 32769, .. })));
}

#[test]
fn flow_events_are_ignored() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"flow","src_ip":"10.0.0.5"}"#;
    assert!(matches!(parse_line(line), Ok(ParsedLine::Ignored)));
}

#[test]
fn stats_event_flattens_counters() {
    let line = r#"{"timestamp":"2026-01-15T10:30:45Z","event_type":"stats","stats":{"uptime":100,"latency_us":250,"capture":{"kernel_packets":50000,"kernel_drops":12},"decoder":{"pkts":49988,"bytes":4200000},"detect":{"alert":17},"flow":{"total":900,"active":40,"memuse":8388608},"flow_mgr":{"flows_removed":860}}}"#;
    let snapshot = match parse_line(line).unwrap() {
        ParsedLine::Stats(snapshot) => snapshot,
        other => panic!("expected stats, got {other:?}"),
    };

    assert_eq!(snapshot.packets_captured, 50_000);
    assert_eq!(snapshot.packets_dropped, 12);
    assert_eq!(snapshot.bytes, 4_200_000);
    assert_eq!(snapshot.alerts_total, 17);
    assert_eq!(snapshot.flows_active, 40);
    assert_eq!(snapshot.flows_total, 900);
    assert_eq!(snapshot.memory_mb, 8);
    assert_eq!(snapshot.uptime_secs, 100);
    assert_eq!(snapshot.latency_usecs, 250);
    assert!((snapshot.throughput - 42_000.0).abs() < f64::EPSILON);
}

#[test]
fn stats_without_active_falls_back_to_total_minus_removed() {
    let line = r#"{"event_type":"stats","stats":{"uptime":10,"flow":{"total":100},"flow_mgr":{"flows_removed":60}}}"#;
    match parse_line(line).unwrap() {
        ParsedLine::Stats(snapshot) => assert_eq!(snapshot.flows_active, 40),
        other => panic!("expected stats, got {other:?}"),
    }
}

#[test]
fn malformed_json_is_an_error() {
    assert!(matches!(parse_line("{not json"), Err(ParseError::Json(_))));
}

#[test]
fn missing_event_type_is_an_error() {
    assert!(matches!(
        parse_line(r#"{"timestamp":"2026-01-15T10:30:45Z"}"#),
        Err(ParseError::MissingEventType)
    ));
}

#[test]
fn unknown_event_type_is_an_error() {
    assert!(matches!(
        parse_line(r#"{"event_type":"telemetry"}"#),
        Err(ParseError::UnknownEventType(_))
    ));
}
