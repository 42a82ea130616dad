// SPDX-License-Identifier: MIT

//! `{data_dir}/{module}.persist`: the durable feature set and module-change
//! subscription index for one module (§3 "Subscription", §6).

use crate::error::StorageError;
use crate::lock::FileLockGuard;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A durable module-change subscription, persisted so it survives restart
/// (§4.7; transient `install`/`feature` subscriptions never reach this file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSubscription {
    pub destination_address: String,
    pub destination_id: u32,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistDocument {
    #[serde(default)]
    pub enabled_features: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<PersistedSubscription>,
}

pub fn persist_path(data_dir: &Path, module: &str) -> PathBuf {
    data_dir.join(format!("{module}.persist"))
}

pub fn read_persist(data_dir: &Path, module: &str) -> Result<PersistDocument, StorageError> {
    let path = persist_path(data_dir, module);
    if !path.exists() {
        return Ok(PersistDocument::default());
    }
    let mut contents = String::new();
    OpenOptions::new().read(true).open(&path)?.read_to_string(&mut contents)?;
    if contents.trim().is_empty() {
        return Ok(PersistDocument::default());
    }
    serde_json::from_str(&contents).map_err(|e| StorageError::Malformed { path: path.display().to_string(), source: e })
}

pub fn write_persist(data_dir: &Path, module: &str, doc: &PersistDocument) -> Result<(), StorageError> {
    let path = persist_path(data_dir, module);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
    let mut guard = FileLockGuard::try_exclusive(file)
        .map_err(|source| StorageError::LockFailed { path: path.display().to_string(), source })?;
    let body = serde_json::to_vec_pretty(doc)
        .map_err(|e| StorageError::Malformed { path: path.display().to_string(), source: e })?;
    let file = guard.file_mut();
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&body)?;
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_persist_file_reads_as_default() {
        let dir = tempdir().unwrap();
        assert_eq!(read_persist(dir.path(), "test-module").unwrap(), PersistDocument::default());
    }

    #[test]
    fn write_then_read_round_trips_subscriptions_and_features() {
        let dir = tempdir().unwrap();
        let doc = PersistDocument {
            enabled_features: vec!["extended".into()],
            subscriptions: vec![PersistedSubscription {
                destination_address: "unix:/tmp/sub.sock".into(),
                destination_id: 7,
                path: Some("/test-module:location".into()),
            }],
        };
        write_persist(dir.path(), "test-module", &doc).unwrap();
        assert_eq!(read_persist(dir.path(), "test-module").unwrap(), doc);
    }
}
