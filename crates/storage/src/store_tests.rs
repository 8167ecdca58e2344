// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded store tests: ordering, eviction, severity filter.

use super::*;
use vnids_core::{Endpoint, EventKind, EventRecord, Protocol, Severity};

fn open_store() -> (tempfile::TempDir, EventStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::open(&dir.path().join("events.db")).unwrap();
    (dir, store)
}

fn alert(ts_secs: i64, sid: u64, severity: Severity) -> EventRecord {
    EventRecord {
        id: format!("flow-{sid}"),
        ts_secs,
        ts_usecs: 0,
        kind: EventKind::Alert,
        severity,
        protocol: Protocol::Tcp,
        src: Endpoint::new("10.0.0.5", 1234),
        dst: Endpoint::new("10.0.0.6", 80),
        signature_id: sid,
        gid: 1,
        message: format!("alert {sid}"),
        metadata: None,
    }
}

#[test]
fn open_creates_schema_and_empty_store() {
    let (_dir, store) = open_store();
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.cap(), DEFAULT_CAP);
    assert!(store.query_recent(10, None).unwrap().is_empty());
}

#[test]
fn open_fails_on_unreachable_path() {
    let err = EventStore::open(std::path::Path::new("/nonexistent/dir/events.db")).unwrap_err();
    assert!(matches!(err, StoreError::Open { .. }));
}

#[test]
fn insert_roundtrips_all_fields() {
    let (_dir, store) = open_store();
    let mut event = alert(1000, 2001, Severity::High);
    event.metadata = Some(vnids_core::EventMetadata::DoIp {
        payload_type: 0x8001,
        source_address: 0x0e00,
        target_address: 0x1010,
    });
    store.insert(&event).unwrap();

    let rows = store.query_recent(1, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event, event);
    assert!(rows[0].ordinal > 0);
    assert!(rows[0].inserted_at > 0);
}

#[test]
fn query_recent_orders_by_timestamp_then_ordinal_desc() {
    let (_dir, store) = open_store();
    // Two events share ts=2000; the later insert must come back first
    store.insert(&alert(1000, 1, Severity::Medium)).unwrap();
    store.insert(&alert(2000, 2, Severity::Medium)).unwrap();
    store.insert(&alert(2000, 3, Severity::Medium)).unwrap();
    store.insert(&alert(1500, 4, Severity::Medium)).unwrap();

    let rows = store.query_recent(10, None).unwrap();
    let sids: Vec<u64> = rows.iter().map(|r| r.event.signature_id).collect();
    assert_eq!(sids, vec![3, 2, 4, 1]);

    // Ordinals are strictly increasing in insert order
    let mut ordinals: Vec<i64> = rows.iter().map(|r| r.ordinal).collect();
    ordinals.sort_unstable();
    assert!(ordinals.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn query_recent_limits_row_count() {
    let (_dir, store) = open_store();
    for sid in 0..20 {
        store.insert(&alert(1000 + sid as i64, sid, Severity::Low)).unwrap();
    }
    assert_eq!(store.query_recent(5, None).unwrap().len(), 5);
    assert_eq!(store.query_recent(100, None).unwrap().len(), 20);
}

#[test]
fn severity_filter_admits_at_least_as_severe() {
    let (_dir, store) = open_store();
    store.insert(&alert(1, 1, Severity::Critical)).unwrap();
    store.insert(&alert(2, 2, Severity::High)).unwrap();
    store.insert(&alert(3, 3, Severity::Medium)).unwrap();
    store.insert(&alert(4, 4, Severity::Low)).unwrap();
    store.insert(&alert(5, 5, Severity::Info)).unwrap();

    let rows = store.query_recent(10, Some(Severity::Medium)).unwrap();
    let sids: Vec<u64> = rows.iter().map(|r| r.event.signature_id).collect();
    assert_eq!(sids, vec![3, 2, 1]);

    assert_eq!(store.query_recent(10, None).unwrap().len(), 5);
}

#[test]
fn eviction_keeps_count_at_or_under_cap() {
    let (_dir, store) = open_store();
    store.set_cap(2_000).unwrap();

    // Enough inserts to trip several cap checks (every 1000 inserts)
    for sid in 0..5_000u64 {
        store.insert(&alert(sid as i64, sid, Severity::Info)).unwrap();
    }

    let count = store.count().unwrap();
    assert!(count <= 2_000, "count {count} exceeds cap after eviction check");

    // Oldest rows went first: the newest signature ids survive
    let rows = store.query_recent(1, None).unwrap();
    assert_eq!(rows[0].event.signature_id, 4_999);

    let stats = store.stats();
    assert_eq!(stats.inserted, 5_000);
    assert!(stats.deleted >= 3_000);
}

#[test]
fn set_cap_evicts_immediately() {
    let (_dir, store) = open_store();
    for sid in 0..500u64 {
        store.insert(&alert(sid as i64, sid, Severity::Info)).unwrap();
    }
    assert_eq!(store.count().unwrap(), 500);

    store.set_cap(100).unwrap();
    // Eviction removes count - cap + batch, floor is zero rows left at most cap
    assert!(store.count().unwrap() <= 100);
}

#[test]
fn get_by_ordinal() {
    let (_dir, store) = open_store();
    store.insert(&alert(1000, 7, Severity::High)).unwrap();
    let rows = store.query_recent(1, None).unwrap();
    let ordinal = rows[0].ordinal;

    let fetched = store.get(ordinal).unwrap().expect("row should exist");
    assert_eq!(fetched.event.signature_id, 7);
    assert!(store.get(ordinal + 999).unwrap().is_none());
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");
    {
        let store = EventStore::open(&path).unwrap();
        store.insert(&alert(1000, 42, Severity::High)).unwrap();
        store.close();
    }
    let store = EventStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.query_recent(1, None).unwrap()[0].event.signature_id, 42);
}
