// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON file writes: serialize, write to a sibling tmp file, rename.
//! A reader either sees the previous complete record or the new one.

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Write `value` as pretty JSON at `path` atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &data).map_err(|e| StorageError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Read a JSON record, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    let value = serde_json::from_slice(&data).map_err(|e| StorageError::json(path, e))?;
    Ok(Some(value))
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
