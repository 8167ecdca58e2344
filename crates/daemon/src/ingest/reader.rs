// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed NDJSON line reader over the engine's event socket.
//!
//! A single growable byte buffer frames `\n`-terminated lines out of the
//! stream. The buffer starts at 64 KiB and doubles once to a 128 KiB cap; a
//! line that overruns the cap is discarded whole (warning + counter) and
//! framing resumes at the next newline.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, warn};

/// Initial framing buffer size.
pub const INITIAL_BUF_SIZE: usize = 64 * 1024;

/// Hard cap on the framing buffer, and so on a single line.
pub const MAX_LINE_SIZE: usize = 128 * 1024;

/// Result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Timeout,
}

/// Result of a buffer fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Bytes were appended to the buffer.
    Data(usize),
    /// Socket had no data after all (spurious readiness).
    WouldBlock,
    /// Peer closed; caller should reset and reconnect.
    Eof,
}

pub struct LineReader {
    path: PathBuf,
    stream: Option<UnixStream>,
    buf: Vec<u8>,
    filled: usize,
    /// Swallowing the tail of an over-cap line until its newline.
    discarding: bool,
    oversized_lines: u64,
}

impl LineReader {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            stream: None,
            buf: vec![0; INITIAL_BUF_SIZE],
            filled: 0,
            discarding: false,
            oversized_lines: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Lines dropped for exceeding [`MAX_LINE_SIZE`].
    pub fn oversized_lines(&self) -> u64 {
        self.oversized_lines
    }

    /// Connect to the event socket. Pending connects are driven to completion
    /// by the runtime rather than surfaced as errors.
    pub async fn connect(&mut self) -> io::Result<()> {
        let stream = UnixStream::connect(&self.path).await?;
        self.stream = Some(stream);
        self.filled = 0;
        self.discarding = false;
        Ok(())
    }

    /// Tear down the connection; buffered bytes are dropped.
    pub fn reset(&mut self) {
        self.stream = None;
        self.filled = 0;
        self.discarding = false;
    }

    /// Wait until a line can be framed or the socket is readable.
    ///
    /// Returns `Ready` without a syscall when a complete line is already
    /// buffered. Errors from the readiness probe surface on the next `fill`.
    pub async fn wait(&mut self, timeout: Duration) -> WaitOutcome {
        if self.buffered_line_at().is_some() {
            return WaitOutcome::Ready;
        }
        let Some(stream) = self.stream.as_ref() else {
            return WaitOutcome::Timeout;
        };
        match tokio::time::timeout(timeout, stream.readable()).await {
            Ok(_) => WaitOutcome::Ready,
            Err(_) => WaitOutcome::Timeout,
        }
    }

    /// Pull available bytes from the socket into the framing buffer.
    pub fn fill(&mut self) -> FillOutcome {
        if self.stream.is_none() {
            return FillOutcome::Eof;
        }
        self.ensure_capacity();

        let filled = self.filled;
        let Some(stream) = self.stream.as_ref() else {
            return FillOutcome::Eof;
        };
        match stream.try_read(&mut self.buf[filled..]) {
            Ok(0) => FillOutcome::Eof,
            Ok(n) => {
                self.filled += n;
                if self.discarding {
                    self.drop_through_newline();
                }
                FillOutcome::Data(n)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => FillOutcome::WouldBlock,
            Err(e) => {
                debug!(error = %e, "event socket read error");
                FillOutcome::Eof
            }
        }
    }

    /// Frame the next `\n`-terminated line out of the buffer, shifting the
    /// tail forward. Trailing `\r` is stripped.
    pub fn read_line(&mut self) -> Option<String> {
        let newline = self.buffered_line_at()?;
        let mut end = newline;
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();

        self.buf.copy_within(newline + 1..self.filled, 0);
        self.filled -= newline + 1;
        Some(line)
    }

    fn buffered_line_at(&self) -> Option<usize> {
        self.buf[..self.filled].iter().position(|&b| b == b'\n')
    }

    /// Grow toward the cap; at the cap with no newline, drop the line.
    fn ensure_capacity(&mut self) {
        if self.filled < self.buf.len() {
            return;
        }
        if self.buf.len() < MAX_LINE_SIZE {
            let new_size = (self.buf.len() * 2).min(MAX_LINE_SIZE);
            self.buf.resize(new_size, 0);
            return;
        }
        // Full buffer, no newline anywhere in it: the line cannot fit.
        warn!(cap = MAX_LINE_SIZE, "event line exceeds cap, dropping");
        self.oversized_lines += 1;
        self.filled = 0;
        self.discarding = true;
    }

    fn drop_through_newline(&mut self) {
        match self.buffered_line_at() {
            Some(newline) => {
                self.buf.copy_within(newline + 1..self.filled, 0);
                self.filled -= newline + 1;
                self.discarding = false;
            }
            None => {
                // Still inside the oversized line
                self.filled = 0;
            }
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
