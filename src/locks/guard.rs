//! RAII guard for the exclusive bus lock.

use super::LockError;
use crate::fs::same_file;
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive `flock` on a lock record, held for the duration of bus I/O.
///
/// Holds its own open file description, so it conflicts with every other
/// shared or exclusive lock on the record, including ones taken by this
/// process. When dropped, the lock is released.
#[derive(Debug)]
pub struct BusLock {
    /// Path of the locked record.
    path: PathBuf,

    /// The locked handle; `None` once released.
    file: Option<File>,
}

impl BusLock {
    /// Block until an exclusive lock on `path` is obtained.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    pub(super) fn acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(path, e)),
        };

        FileExt::lock_exclusive(&file).map_err(|e| LockError::io(path, e))?;
        debug!(path = %path.display(), "exclusive bus lock taken");

        Ok(Some(Self {
            path: path.to_path_buf(),
            file: Some(file),
        }))
    }

    /// Whether the locked handle still refers to the file at the record path.
    ///
    /// A record can be removed and republished between opening and locking
    /// it; a lock on the old inode excludes nobody.
    pub(super) fn is_current(&self) -> Result<bool, LockError> {
        match &self.file {
            Some(file) => same_file(file, &self.path).map_err(|e| LockError::io(&self.path, e)),
            None => Ok(false),
        }
    }

    /// Manually release the lock.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(path = %self.path.display(), error = %e, "failed to unlock bus lock");
            }
            debug!(path = %self.path.display(), "exclusive bus lock released");
        }
    }
}

impl Drop for BusLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
