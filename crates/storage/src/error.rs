// SPDX-License-Identifier: MIT

use sysrepo_core::{ErrorCode, SrError};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record in {path}: {source}")]
    Malformed { path: String, #[source] source: serde_json::Error },
    #[error("could not acquire advisory lock on {path}: {source}")]
    LockFailed { path: String, #[source] source: std::io::Error },
}

impl From<StorageError> for SrError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(io) => SrError::with_message(ErrorCode::Io, io.to_string()),
            StorageError::Malformed { path, source } => {
                SrError::with_path(ErrorCode::Io, format!("malformed persisted record: {source}"), path)
            }
            StorageError::LockFailed { path, source } => {
                SrError::with_path(ErrorCode::Locked, source.to_string(), path)
            }
        }
    }
}
