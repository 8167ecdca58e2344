// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot control-plane client: connect, frame a request, read the framed
//! response.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::net::UnixStream;
use vnids_wire::{encode, read_message, write_message, Request, Response};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn send(socket: &Path, request: &Request) -> Result<Response> {
    let mut stream = UnixStream::connect(socket).await?;

    let body = encode(request)?;
    write_message(&mut stream, &body).await?;

    let body = tokio::time::timeout(REQUEST_TIMEOUT, read_message(&mut stream)).await??;
    Ok(vnids_wire::decode(&body)?)
}
