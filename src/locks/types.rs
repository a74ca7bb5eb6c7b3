//! Lock state, paths, and acquisition outcomes.

use super::LockError;
use super::record::LockRecord;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of a [`LockCoordinator`](super::LockCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Nothing written yet.
    Unpublished,
    /// Record published, polling until it names us.
    Acquiring,
    /// Record names us (or a compatible peer); no bus lock yet.
    SharedHeld,
    /// Exclusive `flock` held on the record: bus I/O allowed.
    ExclusiveHeld,
    /// Everything let go.
    Released,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unpublished => "unpublished",
            LockState::Acquiring => "acquiring",
            LockState::SharedHeld => "shared",
            LockState::ExclusiveHeld => "exclusive",
            LockState::Released => "released",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the acquisition loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The record names this process.
    Owned,
    /// The record names a compatible Modbus client; the bus is shared with it.
    SharedWithPeer(LockRecord),
}

/// Filesystem locations used to lock one serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPaths {
    /// The serial device as given on the command line.
    pub device: String,

    /// The lock record (e.g. `/var/lock/LCK..ttyUSB0`).
    pub record: PathBuf,

    /// The temporary file used to publish the record (`<record>.<pid>`).
    pub temp: PathBuf,
}

impl LockPaths {
    /// Derive lock paths from the device's base name.
    pub fn for_device(device: &str, lock_dir: &Path, prefix: &str, pid: u32) -> Result<Self, LockError> {
        let base = Path::new(device)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LockError::InvalidDevice(device.to_string()))?;

        let record = lock_dir.join(format!("{}{}", prefix, base));
        let temp = lock_dir.join(format!("{}{}.{}", prefix, base, pid));

        Ok(Self {
            device: device.to_string(),
            record,
            temp,
        })
    }
}
