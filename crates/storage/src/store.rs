// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use vnids_core::{Endpoint, EventKind, EventMetadata, EventRecord, Protocol, Severity};

/// Default row cap.
pub const DEFAULT_CAP: u64 = 100_000;

/// Rows removed per eviction pass, and the insert interval between cap checks.
pub const EVICT_BATCH: u64 = 1_000;

/// Store errors. Open failures are startup-fatal; per-row insert failures are
/// counted by the caller and never abort the process.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open event store at {path}: {source}")]
    Open { path: PathBuf, source: rusqlite::Error },

    #[error("Store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// The persisted projection of an event, with its assigned ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub ordinal: i64,
    /// Insertion wall-clock, seconds since the epoch.
    pub inserted_at: i64,
    #[serde(flatten)]
    pub event: EventRecord,
}

/// Insert/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub inserted: u64,
    pub deleted: u64,
}

struct Inner {
    conn: Connection,
    cap: u64,
    inserts_since_check: u64,
    inserted: u64,
    deleted: u64,
}

/// Bounded append-only event store.
///
/// All entry points serialize on one internal mutex; prepared statements are
/// cached on the connection and never escape the critical section.
pub struct EventStore {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore").finish_non_exhaustive()
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    ordinal      INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id     TEXT NOT NULL,
    ts_secs      INTEGER NOT NULL,
    ts_usecs     INTEGER NOT NULL,
    kind         TEXT NOT NULL,
    severity     INTEGER NOT NULL,
    protocol     TEXT NOT NULL,
    src_addr     TEXT NOT NULL,
    src_port     INTEGER NOT NULL,
    dst_addr     TEXT NOT NULL,
    dst_port     INTEGER NOT NULL,
    signature_id INTEGER NOT NULL,
    gid          INTEGER NOT NULL,
    message      TEXT NOT NULL,
    metadata     TEXT,
    inserted_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_ts ON events (ts_secs DESC, ts_usecs DESC);
CREATE INDEX IF NOT EXISTS idx_events_severity ON events (severity);
CREATE INDEX IF NOT EXISTS idx_events_signature ON events (signature_id);
";

const INSERT_SQL: &str = "INSERT INTO events (event_id, ts_secs, ts_usecs, kind, severity, \
     protocol, src_addr, src_port, dst_addr, dst_port, signature_id, gid, message, metadata, \
     inserted_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

const SELECT_RECENT_SQL: &str = "SELECT ordinal, inserted_at, event_id, ts_secs, ts_usecs, kind, \
     severity, protocol, src_addr, src_port, dst_addr, dst_port, signature_id, gid, message, \
     metadata FROM events WHERE severity <= ?1 \
     ORDER BY ts_secs DESC, ts_usecs DESC, ordinal DESC LIMIT ?2";

const SELECT_BY_ORDINAL_SQL: &str = "SELECT ordinal, inserted_at, event_id, ts_secs, ts_usecs, \
     kind, severity, protocol, src_addr, src_port, dst_addr, dst_port, signature_id, gid, \
     message, metadata FROM events WHERE ordinal = ?1";

const COUNT_SQL: &str = "SELECT COUNT(*) FROM events";

const DELETE_OLDEST_SQL: &str =
    "DELETE FROM events WHERE ordinal IN (SELECT ordinal FROM events ORDER BY ordinal ASC LIMIT ?1)";

impl EventStore {
    /// Open (creating on first use) the store at `path`.
    ///
    /// Enables write-ahead logging with relaxed durability: committed
    /// transactions survive a crash, the last in-flight write may not.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .and_then(|_| conn.pragma_update(None, "synchronous", "NORMAL"))
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;

        // Warm the statement cache so first-insert latency is off the hot path
        conn.set_prepared_statement_cache_capacity(8);
        for sql in [INSERT_SQL, SELECT_RECENT_SQL, SELECT_BY_ORDINAL_SQL, COUNT_SQL, DELETE_OLDEST_SQL]
        {
            conn.prepare_cached(sql)
                .map(drop)
                .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
        }

        debug!(path = %path.display(), "event store opened");
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                cap: DEFAULT_CAP,
                inserts_since_check: 0,
                inserted: 0,
                deleted: 0,
            }),
        })
    }

    /// Append one event. Every [`EVICT_BATCH`] inserts, runs the cap check
    /// and evicts the oldest rows in one batch if the count has overrun.
    pub fn insert(&self, event: &EventRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let metadata = match &event.metadata {
            Some(meta) => Some(serde_json::to_string(meta)?),
            None => None,
        };
        let now = unix_now();

        inner.conn.prepare_cached(INSERT_SQL)?.execute(params![
            event.id,
            event.ts_secs,
            event.ts_usecs,
            event.kind.as_str(),
            event.severity as u8,
            event.protocol.as_str(),
            event.src.addr,
            event.src.port,
            event.dst.addr,
            event.dst.port,
            event.signature_id as i64,
            event.gid,
            event.message,
            metadata,
            now,
        ])?;
        inner.inserted += 1;
        inner.inserts_since_check += 1;

        if inner.inserts_since_check >= EVICT_BATCH {
            inner.inserts_since_check = 0;
            Self::evict_locked(&mut inner)?;
        }
        Ok(())
    }

    /// Newest-first query, at most `max` rows, optionally restricted to
    /// events at least as severe as `min_severity`.
    pub fn query_recent(
        &self,
        max: u64,
        min_severity: Option<Severity>,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let inner = self.inner.lock();
        let severity_bound = min_severity.unwrap_or(Severity::Info) as u8;

        let mut stmt = inner.conn.prepare_cached(SELECT_RECENT_SQL)?;
        let rows = stmt.query_map(params![severity_bound, max as i64], row_to_stored_event)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Fetch one row by its ordinal.
    pub fn get(&self, ordinal: i64) -> Result<Option<StoredEvent>, StoreError> {
        let inner = self.inner.lock();
        let mut stmt = inner.conn.prepare_cached(SELECT_BY_ORDINAL_SQL)?;
        let mut rows = stmt.query_map(params![ordinal], row_to_stored_event)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Current row count.
    pub fn count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        let count: i64 = inner.conn.prepare_cached(COUNT_SQL)?.query_row([], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Change the row cap and apply it immediately.
    pub fn set_cap(&self, cap: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.cap = cap.max(1);
        inner.inserts_since_check = 0;
        Self::evict_locked(&mut inner)
    }

    pub fn cap(&self) -> u64 {
        self.inner.lock().cap
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats { inserted: inner.inserted, deleted: inner.deleted }
    }

    /// Flush the WAL back into the main database file. Called on shutdown;
    /// the connection itself closes on drop.
    pub fn close(&self) {
        let inner = self.inner.lock();
        let checkpoint: rusqlite::Result<()> =
            inner.conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()));
        if let Err(e) = checkpoint {
            warn!("WAL checkpoint on close failed: {}", e);
        }
    }

    /// Delete the oldest `count - cap + EVICT_BATCH` rows when over cap.
    fn evict_locked(inner: &mut Inner) -> Result<(), StoreError> {
        let count: i64 = inner.conn.prepare_cached(COUNT_SQL)?.query_row([], |r| r.get(0))?;
        let count = count as u64;
        if count <= inner.cap {
            return Ok(());
        }

        let to_delete = count - inner.cap + EVICT_BATCH;
        let deleted =
            inner.conn.prepare_cached(DELETE_OLDEST_SQL)?.execute(params![to_delete as i64])?;
        inner.deleted += deleted as u64;
        debug!(deleted, count, cap = inner.cap, "evicted oldest event rows");
        Ok(())
    }
}

fn row_to_stored_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEvent> {
    let kind_str: String = row.get(5)?;
    let severity_raw: u8 = row.get(6)?;
    let protocol_str: String = row.get(7)?;
    let metadata_json: Option<String> = row.get(15)?;

    // Unknown discriminants (from a newer schema) degrade to defaults rather
    // than failing the whole query.
    let metadata: Option<EventMetadata> =
        metadata_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(StoredEvent {
        ordinal: row.get(0)?,
        inserted_at: row.get(1)?,
        event: EventRecord {
            id: row.get(2)?,
            ts_secs: row.get(3)?,
            ts_usecs: row.get(4)?,
            kind: EventKind::parse(&kind_str).unwrap_or(EventKind::Alert),
            severity: Severity::from_index(severity_raw).unwrap_or(Severity::Info),
            protocol: Protocol::parse(&protocol_str).unwrap_or(Protocol::Unknown),
            src: Endpoint { addr: row.get(8)?, port: row.get(9)? },
            dst: Endpoint { addr: row.get(10)?, port: row.get(11)? },
            signature_id: row.get::<_, i64>(12)? as u64,
            gid: row.get(13)?,
            message: row.get(14)?,
            metadata,
        },
    })
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
