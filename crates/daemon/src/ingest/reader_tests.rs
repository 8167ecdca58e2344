// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line framing tests over a real Unix socket pair.

use super::*;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;

struct Fixture {
    _dir: tempfile::TempDir,
    listener: UnixListener,
    reader: LineReader,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eve.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let reader = LineReader::new(path);
    Fixture { _dir: dir, listener, reader }
}

/// Drive wait/fill until `n` lines come out or the budget is spent.
async fn read_lines(reader: &mut LineReader, n: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for _ in 0..500 {
        if lines.len() >= n {
            break;
        }
        if reader.wait(Duration::from_millis(20)).await == WaitOutcome::Timeout {
            continue;
        }
        match reader.fill() {
            FillOutcome::Eof => break,
            FillOutcome::WouldBlock => continue,
            FillOutcome::Data(_) => {
                while let Some(line) = reader.read_line() {
                    lines.push(line);
                }
            }
        }
    }
    lines
}

#[tokio::test]
async fn frames_lines_across_partial_writes() {
    let mut fx = fixture();
    fx.reader.connect().await.unwrap();
    let (mut peer, _) = fx.listener.accept().await.unwrap();

    peer.write_all(b"{\"a\":1}\n{\"b\"").await.unwrap();
    peer.write_all(b":2}\n").await.unwrap();
    peer.flush().await.unwrap();

    let lines = read_lines(&mut fx.reader, 2).await;
    assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
}

#[tokio::test]
async fn buffered_line_reports_ready_without_new_data() {
    let mut fx = fixture();
    fx.reader.connect().await.unwrap();
    let (mut peer, _) = fx.listener.accept().await.unwrap();

    peer.write_all(b"one\ntwo\n").await.unwrap();

    let lines = read_lines(&mut fx.reader, 1).await;
    assert_eq!(lines, vec!["one".to_string()]);

    // "two\n" is already buffered: wait must be Ready instantly
    assert_eq!(fx.reader.wait(Duration::from_millis(1)).await, WaitOutcome::Ready);
    assert_eq!(fx.reader.read_line(), Some("two".to_string()));
}

#[tokio::test]
async fn strips_carriage_return() {
    let mut fx = fixture();
    fx.reader.connect().await.unwrap();
    let (mut peer, _) = fx.listener.accept().await.unwrap();

    peer.write_all(b"crlf line\r\n").await.unwrap();
    let lines = read_lines(&mut fx.reader, 1).await;
    assert_eq!(lines, vec!["crlf line".to_string()]);
}

#[tokio::test]
async fn eof_is_reported_for_reconnect() {
    let mut fx = fixture();
    fx.reader.connect().await.unwrap();
    let (peer, _) = fx.listener.accept().await.unwrap();
    drop(peer);

    // Readiness fires on hangup; fill sees EOF
    let mut saw_eof = false;
    for _ in 0..100 {
        if fx.reader.wait(Duration::from_millis(20)).await == WaitOutcome::Timeout {
            continue;
        }
        if fx.reader.fill() == FillOutcome::Eof {
            saw_eof = true;
            break;
        }
    }
    assert!(saw_eof);

    fx.reader.reset();
    assert!(!fx.reader.is_connected());
}

#[tokio::test]
async fn oversized_line_is_dropped_and_framing_resumes() {
    let mut fx = fixture();
    fx.reader.connect().await.unwrap();
    let (mut peer, _) = fx.listener.accept().await.unwrap();

    // One line larger than the 128 KiB cap, then a normal line
    let writer = tokio::spawn(async move {
        let big = vec![b'x'; MAX_LINE_SIZE + 4096];
        peer.write_all(&big).await.unwrap();
        peer.write_all(b"\n{\"ok\":true}\n").await.unwrap();
        peer.flush().await.unwrap();
        peer
    });

    let lines = read_lines(&mut fx.reader, 1).await;
    let _peer = writer.await.unwrap();

    assert_eq!(lines, vec!["{\"ok\":true}".to_string()]);
    assert_eq!(fx.reader.oversized_lines(), 1);
}

#[tokio::test]
async fn connect_fails_on_missing_socket() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = LineReader::new(dir.path().join("absent.sock"));
    assert!(reader.connect().await.is_err());
    assert!(!reader.is_connected());
}
