// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sysrepo-storage: the Persistence Store. Reads and writes per-module
//! datastore files and the per-module feature/subscription document, all
//! under advisory `flock` locks (§6 "Persistence layout").

mod datastore_file;
mod error;
mod lock;
mod persist_file;

pub use datastore_file::{datastore_path, lock_datastore, read_datastore, write_datastore, write_locked, PersistedNode};
pub use error::StorageError;
pub use lock::FileLockGuard;
pub use persist_file::{persist_path, read_persist, write_persist, PersistDocument, PersistedSubscription};
