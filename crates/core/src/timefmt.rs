// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EVE timestamp parsing.

use chrono::{DateTime, FixedOffset};

/// Parse an ISO-8601 timestamp into a (seconds, microseconds) pair.
///
/// The engine emits either RFC 3339 (`2026-01-15T10:30:45.123456Z`) or the
/// legacy suricata form with a colon-less offset (`...+0000`). Fractional
/// seconds and the timezone are optional.
pub fn parse_eve_timestamp(s: &str) -> Option<(i64, u32)> {
    let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| DateTime::parse_from_str(&format!("{s}+0000"), "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()?;
    Some((parsed.timestamp(), parsed.timestamp_subsec_micros() % 1_000_000))
}
