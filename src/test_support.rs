use crate::locks::{Identity, LockCoordinator, LockSettings};
use crate::process::{ProcessTable, program_name};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const TEST_DEVICE: &str = "/dev/ttyUSB0";

/// In-memory process table shared between a test and the coordinators under
/// test, so processes can "exit" mid-test.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeProcessTable {
    processes: Arc<Mutex<HashMap<u32, String>>>,
}

impl FakeProcessTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a live process; the returned identity records its program
    /// name the way [`Identity::current`] does.
    pub(crate) fn spawn(&self, pid: u32, command: &str) -> Identity {
        self.processes
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(pid, command.to_string());
        Identity {
            pid,
            command: program_name(command).to_string(),
        }
    }
}

impl ProcessTable for FakeProcessTable {
    fn command_line_of(&self, pid: u32) -> Option<String> {
        self.processes
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(&pid)
            .cloned()
    }
}

/// Fast lock settings rooted at `lock_dir`.
pub(crate) fn lock_settings(lock_dir: &Path, wait: Duration) -> LockSettings {
    LockSettings {
        lock_dir: lock_dir.to_path_buf(),
        wait,
        poll_interval: Duration::from_millis(1),
        poll_jitter: 3,
        ..LockSettings::default()
    }
}

pub(crate) fn coordinator(
    lock_dir: &Path,
    wait: Duration,
    table: &FakeProcessTable,
    identity: Identity,
) -> LockCoordinator<FakeProcessTable> {
    LockCoordinator::with_identity(TEST_DEVICE, lock_settings(lock_dir, wait), table.clone(), identity).unwrap()
}

pub(crate) fn record_path(lock_dir: &Path) -> std::path::PathBuf {
    lock_dir.join("LCK..ttyUSB0")
}
