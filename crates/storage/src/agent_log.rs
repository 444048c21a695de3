// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-agent log files (`logs/<monitoringId>.log`).
//!
//! One writer per monitoring id, guarded by an advisory lock so a stale
//! writer from a crashed run cannot interleave. The lock is released when
//! the writer drops, including on abnormal termination.

use crate::error::StorageError;
use crate::paths::StateLayout;
use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Pick the next free monitoring id by scanning the logs directory.
pub fn allocate_monitoring_id(layout: &StateLayout) -> Result<u64, StorageError> {
    let dir = layout.logs_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
        Err(e) => return Err(StorageError::io(&dir, e)),
    };

    let mut max = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(&dir, e))?;
        let name = entry.file_name();
        let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".log")) else {
            continue;
        };
        if let Ok(n) = stem.parse::<u64>() {
            max = max.max(n);
        }
    }
    Ok(max + 1)
}

/// Append-only writer for one agent's streaming log.
#[derive(Debug)]
pub struct AgentLogWriter {
    monitoring_id: u64,
    path: PathBuf,
    file: File,
}

impl AgentLogWriter {
    /// Open (creating if needed) and lock the log for `monitoring_id`.
    pub fn open(layout: &StateLayout, monitoring_id: u64) -> Result<Self, StorageError> {
        let path = layout.log_file(monitoring_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        file.try_lock_exclusive()
            .map_err(|_| StorageError::LogLocked(monitoring_id))?;
        Ok(Self {
            monitoring_id,
            path,
            file,
        })
    }

    pub fn monitoring_id(&self) -> u64 {
        self.monitoring_id
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one timestamped line.
    pub fn append(&mut self, line: &str) -> Result<(), StorageError> {
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        writeln!(self.file, "[{stamp}] {line}").map_err(|e| StorageError::io(&self.path, e))
    }

    /// Append raw text (already-rendered stream chunks).
    pub fn append_raw(&mut self, text: &str) -> Result<(), StorageError> {
        self.file
            .write_all(text.as_bytes())
            .map_err(|e| StorageError::io(&self.path, e))
    }

    /// Record an aborted run and flush.
    pub fn mark_aborted(&mut self) -> Result<(), StorageError> {
        self.append("agent aborted")?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush().map_err(|e| StorageError::io(&self.path, e))
    }
}

impl Drop for AgentLogWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "agent_log_tests.rs"]
mod tests;
