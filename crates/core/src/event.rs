// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized event record produced by ingest.
//!
//! Every alert or anomaly read from the engine's EVE stream is reduced to this
//! one shape before it crosses the queue. Field widths are bounded at the
//! parse boundary so nothing downstream has to re-check them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an event identifier, in bytes.
pub const MAX_ID_LEN: usize = 36;

/// Maximum length of an endpoint address string, in bytes.
pub const MAX_ADDR_LEN: usize = 45;

/// Maximum length of the human-readable message, in bytes.
pub const MAX_MESSAGE_LEN: usize = 256;

/// Kind of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Alert,
    Anomaly,
    Flow,
    Stats,
}

impl EventKind {
    /// Inverse of [`EventKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "alert" => Some(EventKind::Alert),
            "anomaly" => Some(EventKind::Anomaly),
            "flow" => Some(EventKind::Flow),
            "stats" => Some(EventKind::Stats),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Alert => "alert",
            EventKind::Anomaly => "anomaly",
            EventKind::Flow => "flow",
            EventKind::Stats => "stats",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity. Lower discriminant is more severe, so `Ord` sorts
/// Critical first and `a <= b` reads "a is at least as severe as b".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Severity {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
    Info = 5,
}

impl Severity {
    /// Map an engine rule priority onto a severity.
    ///
    /// Priorities follow the classification convention: 1 is the most urgent.
    /// Anything outside 1–4 is informational.
    pub fn from_priority(priority: u32) -> Self {
        match priority {
            1 => Severity::Critical,
            2 => Severity::High,
            3 => Severity::Medium,
            4 => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Reconstruct a severity from its stored discriminant.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Severity::Critical),
            2 => Some(Severity::High),
            3 => Some(Severity::Medium),
            4 => Some(Severity::Low),
            5 => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol discriminator covering transport, automotive, and application
/// protocols the engine can attribute an event to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Igmp,
    #[serde(rename = "someip")]
    SomeIp,
    #[serde(rename = "doip")]
    DoIp,
    Gbt32960,
    Http,
    Tls,
    Dns,
    Mqtt,
    Ftp,
    Telnet,
    Unknown,
}

impl Protocol {
    /// Parse the EVE `proto` field (transport layer).
    pub fn from_transport(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            "ICMP" | "IPV6-ICMP" | "ICMPV6" => Protocol::Icmp,
            "IGMP" => Protocol::Igmp,
            _ => Protocol::Unknown,
        }
    }

    /// Parse the EVE `app_proto` field. Returns `None` for values we do not
    /// recognize so the transport protocol stays in effect.
    pub fn from_app(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "http2" => Some(Protocol::Http),
            "tls" => Some(Protocol::Tls),
            "dns" => Some(Protocol::Dns),
            "mqtt" => Some(Protocol::Mqtt),
            "ftp" | "ftp-data" => Some(Protocol::Ftp),
            "telnet" => Some(Protocol::Telnet),
            "someip" => Some(Protocol::SomeIp),
            "doip" => Some(Protocol::DoIp),
            "gbt32960" => Some(Protocol::Gbt32960),
            _ => None,
        }
    }

    /// Inverse of [`Protocol::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "icmp" => Some(Protocol::Icmp),
            "igmp" => Some(Protocol::Igmp),
            "someip" => Some(Protocol::SomeIp),
            "doip" => Some(Protocol::DoIp),
            "gbt32960" => Some(Protocol::Gbt32960),
            "http" => Some(Protocol::Http),
            "tls" => Some(Protocol::Tls),
            "dns" => Some(Protocol::Dns),
            "mqtt" => Some(Protocol::Mqtt),
            "ftp" => Some(Protocol::Ftp),
            "telnet" => Some(Protocol::Telnet),
            "unknown" => Some(Protocol::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Igmp => "igmp",
            Protocol::SomeIp => "someip",
            Protocol::DoIp => "doip",
            Protocol::Gbt32960 => "gbt32960",
            Protocol::Http => "http",
            Protocol::Tls => "tls",
            Protocol::Dns => "dns",
            Protocol::Mqtt => "mqtt",
            Protocol::Ftp => "ftp",
            Protocol::Telnet => "telnet",
            Protocol::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network endpoint. Port defaults to 0 when the stream omits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub addr: String,
    pub port: u16,
}

impl Endpoint {
    /// Build an endpoint, truncating the address to [`MAX_ADDR_LEN`] bytes.
    pub fn new(addr: &str, port: u16) -> Self {
        Self { addr: truncate_utf8(addr, MAX_ADDR_LEN), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Protocol-specific metadata carried alongside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventMetadata {
    SomeIp { service_id: u16, method_id: u16, message_type: u8, return_code: u8 },
    DoIp { payload_type: u16, source_address: u16, target_address: u16 },
}

/// The system's normalized in-memory representation of a detection event.
///
/// Invariants: `kind` and `severity` are always set; `id`, endpoint addresses
/// and `message` are bounded; the timestamp pair has microsecond resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Opaque identifier taken from the stream (flow id), bounded to 36 bytes.
    pub id: String,
    /// Seconds since the Unix epoch.
    pub ts_secs: i64,
    /// Microsecond fraction, 0..1_000_000.
    pub ts_usecs: u32,
    pub kind: EventKind,
    pub severity: Severity,
    pub protocol: Protocol,
    pub src: Endpoint,
    pub dst: Endpoint,
    /// Matched rule signature id, 0 when not rule-attributed.
    pub signature_id: u64,
    /// Matched rule generator id.
    pub gid: u32,
    /// Human-readable message, bounded to 256 bytes.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl EventRecord {
    /// Bound the variable-width fields. Called once at the parse boundary.
    pub fn clamp_limits(mut self) -> Self {
        self.id = truncate_utf8(&self.id, MAX_ID_LEN);
        self.src.addr = truncate_utf8(&self.src.addr, MAX_ADDR_LEN);
        self.dst.addr = truncate_utf8(&self.dst.addr, MAX_ADDR_LEN);
        self.message = truncate_utf8(&self.message, MAX_MESSAGE_LEN);
        self
    }
}

impl Default for EventRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            ts_secs: 0,
            ts_usecs: 0,
            kind: EventKind::Alert,
            severity: Severity::Info,
            protocol: Protocol::Unknown,
            src: Endpoint::default(),
            dst: Endpoint::default(),
            signature_id: 0,
            gid: 0,
            message: String::new(),
            metadata: None,
        }
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence.
fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
