// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flattened engine stats snapshot.

use serde::{Deserialize, Serialize};

/// Flat counters extracted from the engine's periodic stats event.
///
/// Ingest retains only the most recent snapshot; readers take a point sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub packets_captured: u64,
    pub packets_dropped: u64,
    pub bytes: u64,
    pub alerts_total: u64,
    pub flows_active: u64,
    pub flows_total: u64,
    pub memory_mb: u64,
    pub uptime_secs: u64,
    pub latency_usecs: u64,
    /// Bytes per second over the engine's stats interval.
    pub throughput: f64,
}
