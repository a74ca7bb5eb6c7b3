//! Publishing, reading, and clearing lock records.

use super::LockError;
use super::record::{LockRecord, RecordParseError};
use super::types::LockPaths;
use crate::fs::{self, LinkOutcome};
use crate::retry::{Backoff, Jitter};
use fs2::FileExt;
use std::fs::File;
use std::io::{self, Read};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts at creating the temporary record before giving up.
const TEMP_CREATE_ATTEMPTS: u32 = 3;

/// Attempts at pinning a record that keeps being replaced while clearing it.
const CLEAR_ATTEMPTS: u32 = 3;

/// What a poll of the record found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Observation {
    Missing,
    Corrupt(RecordParseError),
    Record(LockRecord),
}

/// Result of [`clear_if_held_by`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ClearOutcome {
    Cleared,
    Missing,
    HeldBy(u32),
    Unrecognized,
}

/// Publish `record` at `paths.record` unless a record is already there.
///
/// The temporary file is always removed afterwards. A temporary file left
/// under our pid can only come from a dead process that had the same pid, so
/// it is removed and creation retried.
pub(super) fn publish(
    paths: &LockPaths,
    record: &LockRecord,
    retry_delay: Duration,
) -> Result<LinkOutcome, LockError> {
    let content = record.encode();
    let mut tries = Backoff::new(TEMP_CREATE_ATTEMPTS, retry_delay).with_jitter(Jitter::Scale(10));

    loop {
        tries.next_attempt();
        match fs::write_new_file(&paths.temp, content.as_bytes()) {
            Ok(()) => break,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && !tries.is_exhausted() => {
                warn!(path = %paths.temp.display(), "removing leftover temporary lock file");
                fs::remove_if_exists(&paths.temp).map_err(|e| LockError::io(&paths.temp, e))?;
                tries.pause();
            }
            Err(e) => return Err(LockError::io(&paths.temp, e)),
        }
    }

    let linked = fs::link_exclusive(&paths.temp, &paths.record);
    let cleanup = fs::remove_if_exists(&paths.temp);

    let outcome = linked.map_err(|e| LockError::io(&paths.record, e))?;
    cleanup.map_err(|e| LockError::io(&paths.temp, e))?;

    debug!(
        path = %paths.record.display(),
        published = outcome == LinkOutcome::Linked,
        "lock record publish"
    );
    Ok(outcome)
}

/// Read the record under a shared lock.
///
/// Blocks while another process holds the record exclusively.
pub(super) fn read_shared(paths: &LockPaths) -> Result<Observation, LockError> {
    let file = match File::open(&paths.record) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Observation::Missing),
        Err(e) => return Err(LockError::io(&paths.record, e)),
    };

    FileExt::lock_shared(&file).map_err(|e| LockError::io(&paths.record, e))?;
    let observation = read_observation(&file).map_err(|e| LockError::io(&paths.record, e));
    let _ = FileExt::unlock(&file);

    observation
}

/// Remove the record if, under an exclusive lock, it still names `pid`.
///
/// Our own temporary file is removed as well.
pub(super) fn clear_if_held_by(paths: &LockPaths, pid: u32) -> Result<ClearOutcome, LockError> {
    fs::remove_if_exists(&paths.temp).map_err(|e| LockError::io(&paths.temp, e))?;

    for _ in 0..CLEAR_ATTEMPTS {
        let file = match File::open(&paths.record) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ClearOutcome::Missing),
            Err(e) => return Err(LockError::io(&paths.record, e)),
        };

        FileExt::lock_exclusive(&file).map_err(|e| LockError::io(&paths.record, e))?;

        // Replaced between open and lock: start over on the new file.
        if !fs::same_file(&file, &paths.record).map_err(|e| LockError::io(&paths.record, e))? {
            continue;
        }

        let observation = read_observation(&file).map_err(|e| LockError::io(&paths.record, e))?;
        let outcome = match observation {
            Observation::Record(record) if record.names(pid) => {
                match fs::remove_if_exists(&paths.record) {
                    Ok(true) => ClearOutcome::Cleared,
                    Ok(false) => ClearOutcome::Missing,
                    Err(e) => return Err(LockError::io(&paths.record, e)),
                }
            }
            Observation::Record(record) => ClearOutcome::HeldBy(record.holder_pid),
            Observation::Corrupt(_) => ClearOutcome::Unrecognized,
            Observation::Missing => ClearOutcome::Missing,
        };

        // Closing the handle drops the exclusive lock after the unlink.
        drop(file);
        return Ok(outcome);
    }

    Err(LockError::TooManyAttempts {
        path: paths.record.clone(),
        attempts: CLEAR_ATTEMPTS,
    })
}

/// Remove the record if, under an exclusive lock, it still fails to parse.
pub(super) fn remove_if_corrupt(paths: &LockPaths) -> Result<bool, LockError> {
    let file = match File::open(&paths.record) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(LockError::io(&paths.record, e)),
    };

    FileExt::lock_exclusive(&file).map_err(|e| LockError::io(&paths.record, e))?;
    if !fs::same_file(&file, &paths.record).map_err(|e| LockError::io(&paths.record, e))? {
        return Ok(false);
    }

    match read_observation(&file).map_err(|e| LockError::io(&paths.record, e))? {
        Observation::Corrupt(_) => fs::remove_if_exists(&paths.record).map_err(|e| LockError::io(&paths.record, e)),
        _ => Ok(false),
    }
}

fn read_observation(file: &File) -> io::Result<Observation> {
    let mut reader = file;
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    let observation = match String::from_utf8(raw) {
        Ok(text) => match text.parse::<LockRecord>() {
            Ok(record) => Observation::Record(record),
            Err(e) => Observation::Corrupt(e),
        },
        Err(_) => Observation::Corrupt(RecordParseError::NotUtf8),
    };
    Ok(observation)
}
