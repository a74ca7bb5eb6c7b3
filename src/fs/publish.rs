//! Exclusive publish of small files via hard links.
//!
//! # Implementation Strategy
//!
//! A record is published in three steps:
//! 1. Create a private temporary file with `O_EXCL` and write the content
//! 2. Sync the file to disk (fsync)
//! 3. Hard-link it to the public name, which fails if that name exists
//!
//! Unlike `rename()`, `link()` never replaces an existing target, so exactly
//! one of several racing writers wins. The temporary file is removed by the
//! caller whatever the outcome.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Result of [`link_exclusive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The target did not exist and now refers to the source.
    Linked,
    /// The target already existed and was left untouched.
    AlreadyExists,
}

/// Create `path` (which must not exist), write `content` and sync it.
///
/// On a write or sync failure the partial file is removed.
pub fn write_new_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;

    let written = file.write_all(content).and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(e);
    }

    Ok(())
}

/// Hard-link `source` to `target` unless `target` already exists.
pub fn link_exclusive(source: &Path, target: &Path) -> io::Result<LinkOutcome> {
    match fs::hard_link(source, target) {
        Ok(()) => {
            sync_parent(target);
            Ok(LinkOutcome::Linked)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(LinkOutcome::AlreadyExists),
        Err(e) => Err(e),
    }
}

/// Remove `path`; returns `false` if it did not exist.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether the open `file` is still the file named by `path`.
///
/// Returns `false` when `path` no longer exists.
#[cfg(unix)]
pub fn same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let open = file.metadata()?;
    match fs::metadata(path) {
        Ok(named) => Ok(open.dev() == named.dev() && open.ino() == named.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
pub fn same_file(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}
