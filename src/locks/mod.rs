//! Serial port locking for tac1100.
//!
//! Several programs (this one, `sdm120c`, `aurora`, ...) may talk to meters
//! on the same RS485 wire. The kernel does not arbitrate access to the tty,
//! so they agree through a UUCP-style lock record.
//!
//! # Lock Files
//!
//! The record lives at `<lock_dir>/<prefix><device basename>`, by default
//! `/var/lock/LCK..ttyUSB0`. It is published by writing a temporary sibling
//! `<record>.<pid>` and hard-linking it into place, so a record is never
//! observed half written by a cooperating writer.
//!
//! # Lock Record
//!
//! The record is a single text line: `<pid>[ <command line>]\n`.
//!
//! # Shared and Exclusive Holds
//!
//! The record is read under a shared `flock`. Once the record names this
//! process (or a compatible Modbus client), the record file is opened again
//! and locked exclusively for the whole bus session; this is what serializes
//! frames on the wire.
//!
//! # Stale Records
//!
//! A record whose pid no longer exists, or whose pid now runs a different
//! command, is stale. Staleness must be seen on two polls in a row before the
//! record is removed.

mod coordinator;
mod guard;
mod operations;
mod policy;
mod record;
mod types;


use crate::exit_codes;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// Re-export public API
pub use coordinator::{DEFAULT_LOCK_DIR, DEFAULT_LOCK_PREFIX, Identity, LockCoordinator, LockSettings};
pub use guard::BusLock;
pub use policy::{Debounce, StaleHolderPolicy, StaleReason, Verdict, DEFAULT_COMPATIBLE_CLIENTS};
pub use record::{LockRecord, RecordParseError};
pub use types::{Claim, LockPaths, LockState};

/// Errors from serial port locking.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process kept the record for longer than the wait budget.
    #[error(
        "unable to lock serial port {device} within {}s: still locked by {}",
        .waited.as_secs(),
        describe_holder(.holder)
    )]
    Timeout {
        device: String,
        waited: Duration,
        holder: Option<u32>,
    },

    /// The polling loop hit its hard iteration bound.
    #[error(
        "exceeded maximum lock attempts ({attempts}), the lock file may be corrupted: try removing '{}' manually",
        .path.display()
    )]
    TooManyAttempts { path: PathBuf, attempts: u32 },

    /// The bus lock was requested in the wrong state.
    #[error("serial port lock is {0}, expected it to be held")]
    NotHeld(LockState),

    /// The device path has no file name to derive a lock record from.
    #[error("serial device '{0}' has no file name to derive a lock file from")]
    InvalidDevice(String),

    /// Unexpected I/O failure on the lock record or its directory.
    #[error("lock file error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    /// Exit code for this failure: resource problems are kept apart from
    /// plain contention.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Io { .. } => exit_codes::RESOURCE_FAILURE,
            LockError::InvalidDevice(_) => exit_codes::USAGE_ERROR,
            LockError::Timeout { .. } | LockError::TooManyAttempts { .. } | LockError::NotHeld(_) => {
                exit_codes::LOCK_FAILURE
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LockError::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_holder(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("process {}", pid),
        None => "an unreadable lock record".to_string(),
    }
}
