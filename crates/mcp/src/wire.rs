// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing for MCP stdio transport.
//!
//! Wire format: one JSON document per line, UTF-8, `\n` terminated.

use crate::McpError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Maximum accepted line length (8 MB).
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Read the next JSON message, skipping blank lines.
/// Returns `Ok(None)` at end of stream.
pub async fn read_message<R, T>(reader: &mut BufReader<R>) -> Result<Option<T>, McpError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_LINE_BYTES {
            return Err(McpError::Config(format!(
                "message too large: {n} bytes (max {MAX_LINE_BYTES})"
            )));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(trimmed)?));
    }
}

/// Write one JSON message followed by a newline, flushing immediately.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), McpError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let mut data = serde_json::to_vec(message)?;
    data.push(b'\n');
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
