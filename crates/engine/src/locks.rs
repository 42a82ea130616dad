// SPDX-License-Identifier: MIT

//! The engine's module/datastore lock table (§3 "Lock table", §4.3 "Locking").

use parking_lot::Mutex;
use std::collections::HashMap;
use sysrepo_core::{ErrorCode, SessionId, SrError};

/// Per-module advisory lock plus one whole-datastore lock. Holder is a
/// session id; all locks release when that session ends.
#[derive(Debug, Default)]
pub struct LockTable {
    inner: Mutex<LockTableInner>,
}

#[derive(Debug, Default)]
struct LockTableInner {
    module_locks: HashMap<String, SessionId>,
    datastore_lock: Option<SessionId>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `lock_module` fails `LOCKED` if that module or the whole datastore is
    /// held by another session. `UNKNOWN_MODEL` if `known_modules` doesn't
    /// contain `module` (checked by the caller via its schema context, here
    /// expressed as a bool to keep this table schema-agnostic).
    pub fn lock_module(&self, session: SessionId, module: &str, module_known: bool) -> Result<(), SrError> {
        if !module_known {
            return Err(SrError::with_message(ErrorCode::UnknownModel, module.to_string()));
        }
        let mut inner = self.inner.lock();
        if let Some(holder) = inner.datastore_lock {
            if holder != session {
                return Err(SrError::with_message(ErrorCode::Locked, "datastore is locked by another session"));
            }
        }
        if let Some(&holder) = inner.module_locks.get(module) {
            if holder != session {
                return Err(SrError::with_path(ErrorCode::Locked, "module is locked by another session", module));
            }
            return Ok(());
        }
        inner.module_locks.insert(module.to_string(), session);
        Ok(())
    }

    pub fn unlock_module(&self, session: SessionId, module: &str) -> Result<(), SrError> {
        let mut inner = self.inner.lock();
        match inner.module_locks.get(module) {
            Some(&holder) if holder == session => {
                inner.module_locks.remove(module);
                Ok(())
            }
            Some(_) => Err(SrError::with_path(ErrorCode::Locked, "module is locked by another session", module)),
            None => Ok(()),
        }
    }

    /// `lock_datastore` requires *all* per-module locks free across every
    /// known module.
    pub fn lock_datastore(&self, session: SessionId) -> Result<(), SrError> {
        let mut inner = self.inner.lock();
        if let Some(holder) = inner.datastore_lock {
            if holder != session {
                return Err(SrError::with_message(ErrorCode::Locked, "datastore is locked by another session"));
            }
            return Ok(());
        }
        if inner.module_locks.values().any(|&holder| holder != session) {
            return Err(SrError::with_message(ErrorCode::Locked, "one or more modules are locked by another session"));
        }
        inner.datastore_lock = Some(session);
        Ok(())
    }

    pub fn unlock_datastore(&self, session: SessionId) -> Result<(), SrError> {
        let mut inner = self.inner.lock();
        match inner.datastore_lock {
            Some(holder) if holder == session => {
                inner.datastore_lock = None;
                Ok(())
            }
            Some(_) => Err(SrError::with_message(ErrorCode::Locked, "datastore is locked by another session")),
            None => Ok(()),
        }
    }

    /// Release every lock held by `session` (session end, §4.3).
    pub fn release_all(&self, session: SessionId) {
        let mut inner = self.inner.lock();
        inner.module_locks.retain(|_, &mut holder| holder != session);
        if inner.datastore_lock == Some(session) {
            inner.datastore_lock = None;
        }
    }

    /// Whether a mutating commit against `module` is blocked by a lock held
    /// by some *other* session (used by the commit protocol).
    pub fn is_blocked_for(&self, session: SessionId, module: &str) -> bool {
        let inner = self.inner.lock();
        if let Some(holder) = inner.datastore_lock {
            if holder != session {
                return true;
            }
        }
        matches!(inner.module_locks.get(module), Some(&holder) if holder != session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_module_on_unknown_module_is_unknown_model() {
        let table = LockTable::new();
        let err = table.lock_module(SessionId(1), "unknown-model", false).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
    }

    #[test]
    fn datastore_lock_blocks_other_sessions_module_lock() {
        let table = LockTable::new();
        table.lock_datastore(SessionId(1)).unwrap();
        let err = table.lock_module(SessionId(2), "any-module", true).unwrap_err();
        assert_eq!(err.code, ErrorCode::Locked);
    }

    #[test]
    fn datastore_lock_requires_all_module_locks_free() {
        let table = LockTable::new();
        table.lock_module(SessionId(1), "m", true).unwrap();
        let err = table.lock_datastore(SessionId(2)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Locked);
    }

    #[test]
    fn release_all_frees_module_and_datastore_locks() {
        let table = LockTable::new();
        table.lock_datastore(SessionId(1)).unwrap();
        table.release_all(SessionId(1));
        table.lock_datastore(SessionId(2)).unwrap();
    }

    #[test]
    fn retry_after_disconnect_succeeds() {
        let table = LockTable::new();
        table.lock_datastore(SessionId(1)).unwrap();
        assert!(table.lock_module(SessionId(2), "m", true).is_err());
        table.release_all(SessionId(1));
        assert!(table.lock_module(SessionId(2), "m", true).is_ok());
    }
}
