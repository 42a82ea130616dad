// SPDX-License-Identifier: MIT

//! Per-module, per-datastore persistence files (§6 "Persistence layout"):
//! `{data_dir}/{module}.{datastore}`, one JSON Lines record per path/value
//! pair, rewritten wholesale on every commit under an exclusive advisory
//! lock.

use crate::error::StorageError;
use crate::lock::FileLockGuard;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use sysrepo_core::{Datastore, Value};

/// One persisted `(path, value)` pair. A container/list node without a
/// scalar value is still recorded (as `Value::Container`/`Value::List`) so
/// presence is reconstructible without re-deriving it from descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedNode {
    pub path: String,
    #[serde(flatten)]
    pub value: Value,
}

pub fn datastore_path(data_dir: &Path, module: &str, datastore: Datastore) -> PathBuf {
    data_dir.join(format!("{module}.{}", datastore.file_suffix()))
}

/// Read every record from a module's datastore file. A missing file is an
/// empty datastore, not an error (first run, or a module never committed).
pub fn read_datastore(data_dir: &Path, module: &str, datastore: Datastore) -> Result<Vec<PersistedNode>, StorageError> {
    let path = datastore_path(data_dir, module, datastore);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = OpenOptions::new().read(true).open(&path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PersistedNode =
            serde_json::from_str(&line).map_err(|e| StorageError::Malformed { path: path.display().to_string(), source: e })?;
        records.push(record);
    }
    Ok(records)
}

/// Acquire the exclusive lock on a module's datastore file without reading
/// or writing it yet — used by the commit protocol's "refresh base" step
/// (§4.5) to hold the lock across both the re-read and the eventual write.
pub fn lock_datastore(data_dir: &Path, module: &str, datastore: Datastore) -> Result<(FileLockGuard, PathBuf), StorageError> {
    let path = datastore_path(data_dir, module, datastore);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
    let guard = FileLockGuard::try_exclusive(file)
        .map_err(|source| StorageError::LockFailed { path: path.display().to_string(), source })?;
    Ok((guard, path))
}

/// Truncate and rewrite a module's datastore file under an already-held
/// lock, then `fdatasync` (§4.5 step 7, §6 "Writers use `ftruncate` +
/// rewrite + `fdatasync`").
pub fn write_locked(guard: &mut FileLockGuard, records: &[PersistedNode]) -> Result<(), StorageError> {
    let file = guard.file_mut();
    file.set_len(0)?;
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(0))?;
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| StorageError::Malformed {
            path: "<in-memory record>".to_string(),
            source: e,
        })?;
        writeln!(file, "{line}")?;
    }
    file.sync_data()?;
    Ok(())
}

/// Convenience: lock, rewrite, and release in one call (used outside the
/// two-phase commit protocol, e.g. initial seeding in tests).
pub fn write_datastore(data_dir: &Path, module: &str, datastore: Datastore, records: &[PersistedNode]) -> Result<(), StorageError> {
    let (mut guard, _path) = lock_datastore(data_dir, module, datastore)?;
    write_locked(&mut guard, records)
}
