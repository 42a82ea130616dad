// SPDX-License-Identifier: MIT

//! Per-session working copies of a module's tree (§3 "Per-session overlay").

use sysrepo_yang::DataTree;

/// A session-private mutable copy of a module's tree, forked from a
/// datastore. Created lazily on first touch; discarded on `discard_changes`,
/// after a successful commit, or when the session ends.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub tree: DataTree,
    /// An untouched copy of `tree` as it stood at fork time, kept around so
    /// `session_refresh` can tell *which* of a session's edited paths were
    /// also changed by a concurrent committer (§4.3 "conflict with the new
    /// base") rather than merely that the module's file changed at all.
    pub original_base: DataTree,
    /// The source file's mtime (as epoch ms) this overlay was forked from,
    /// used by `session_refresh`/commit to detect concurrent writers.
    pub source_timestamp: u64,
    pub modified: bool,
}

impl Overlay {
    pub fn fork(tree: DataTree, source_timestamp: u64) -> Self {
        Self { original_base: tree.clone(), tree, source_timestamp, modified: false }
    }
}
