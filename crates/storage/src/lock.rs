// SPDX-License-Identifier: MIT

//! RAII advisory-lock guard (§9 "Advisory file locking... require scoped
//! acquisition with guaranteed release on every exit path").

use fs2::FileExt;
use std::fs::File;
use std::io;

/// Holds an exclusive or shared advisory lock on `file` for the guard's
/// lifetime. The OS releases the lock when the fd closes, but we also drop
/// it explicitly so a long-lived `File` handle doesn't accidentally keep it.
pub struct FileLockGuard {
    file: File,
}

impl FileLockGuard {
    pub fn try_exclusive(file: File) -> io::Result<Self> {
        file.try_lock_exclusive()?;
        Ok(Self { file })
    }

    pub fn try_shared(file: File) -> io::Result<Self> {
        file.try_lock_shared()?;
        Ok(Self { file })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
