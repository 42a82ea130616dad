// SPDX-License-Identifier: MIT

//! The Access Control component (§4.8): every mutating operation consults
//! this with `(session, path, mode)` before the Data Manager touches an
//! overlay. Checks map the path's module to its data file and apply the
//! effective user's filesystem permissions; for read operations the check
//! is advisory and a violation becomes `UNAUTHORIZED` rather than blocking.

use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use sysrepo_core::{AccessMode, EffectiveUser, ErrorCode, SrError};

/// Maps modules to their backing data files and checks the effective user's
/// filesystem permissions against them.
#[derive(Debug, Clone)]
pub struct AccessController {
    data_dir: PathBuf,
}

impl AccessController {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn module_file(&self, module: &str, datastore: sysrepo_core::Datastore) -> PathBuf {
        self.data_dir.join(format!("{module}.{}", datastore.file_suffix()))
    }

    /// Consult the controller for `(session, path, mode)`. A module with no
    /// data file yet (never committed) is treated as permissive — there is
    /// nothing on disk to own permissions yet.
    pub fn check(
        &self,
        user: &EffectiveUser,
        module: &str,
        datastore: sysrepo_core::Datastore,
        mode: AccessMode,
    ) -> Result<(), SrError> {
        let file = self.module_file(module, datastore);
        let metadata = match std::fs::metadata(&file) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SrError::from(e).path(file.display().to_string())),
        };
        if permits(&metadata, &file, user.effective, mode) {
            Ok(())
        } else {
            Err(SrError::with_path(
                ErrorCode::Unauthorized,
                format!("user {} lacks {mode:?} access to module {module}", user.effective),
                module,
            ))
        }
    }
}

fn permits(metadata: &std::fs::Metadata, _file: &Path, user: sysrepo_core::UserId, mode: AccessMode) -> bool {
    if user.is_privileged() {
        return true;
    }
    let perm = metadata.permissions().mode();
    let (owner_bit, group_bit, other_bit) = match mode {
        AccessMode::Read => (0o400, 0o040, 0o004),
        AccessMode::ReadWrite => (0o200, 0o020, 0o002),
    };
    if metadata.uid() == user.uid {
        perm & owner_bit != 0
    } else if metadata.gid() == user.gid {
        perm & group_bit != 0
    } else {
        perm & other_bit != 0
    }
}
