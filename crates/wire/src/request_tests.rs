// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request schema and command-set tests.

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    status = { "status", Command::Status },
    get_stats = { "get_stats", Command::GetStats },
    reload_rules = { "reload_rules", Command::ReloadRules },
    set_config = { "set_config", Command::SetConfig },
    shutdown = { "shutdown", Command::Shutdown },
    list_rules = { "list_rules", Command::ListRules },
    list_events = { "list_events", Command::ListEvents },
    validate_rules = { "validate_rules", Command::ValidateRules },
)]
fn known_commands_resolve(name: &str, expected: Command) {
    assert_eq!(Command::parse(name), Some(expected));
    assert_eq!(expected.as_str(), name);
}

#[parameterized(
    unknown = { "restart" },
    case_sensitive = { "Status" },
    empty = { "" },
)]
fn unknown_commands_do_not_resolve(name: &str) {
    assert_eq!(Command::parse(name), None);
}

#[test]
fn params_are_optional_on_the_wire() {
    let decoded: Request = serde_json::from_str(r#"{"command":"status"}"#).unwrap();
    assert_eq!(decoded.command(), Some(Command::Status));
    assert!(decoded.params.is_none());
    assert!(!decoded.params_malformed());
}

#[test]
fn object_params_are_exposed() {
    let request = Request::with_params("set_config", json!({"key": "log_level", "value": "debug"}));
    let map = request.params_object().expect("object params");
    assert_eq!(map["key"], "log_level");
    assert!(!request.params_malformed());
}

#[parameterized(
    string_blob = { json!("{\"key\":\"x\"}") },
    array = { json!([1, 2, 3]) },
    number = { json!(42) },
)]
fn non_object_params_are_malformed(params: serde_json::Value) {
    let request = Request::with_params("set_config", params);
    assert!(request.params_malformed());
    assert!(request.params_object().is_none());
}

#[test]
fn serialization_omits_absent_params() {
    let json = serde_json::to_string(&Request::new("status")).unwrap();
    assert_eq!(json, r#"{"command":"status"}"#);
}
