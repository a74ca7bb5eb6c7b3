//! Process identity lookups used to fingerprint lock holders.
//!
//! A lock record names its holder by pid and command line. To decide whether
//! the holder is still alive (and still the same program) we need the command
//! line of an arbitrary pid, which on Linux lives in `/proc/<pid>/cmdline` as a
//! NUL-separated argument vector.

use std::fs;
use std::path::PathBuf;


/// Default location of the process table.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Source of process command lines.
///
/// Implementations must never fail: a pid that does not exist, has exited, or
/// cannot be inspected yields `None`.
pub trait ProcessTable {
    /// Command line of `pid`, arguments joined with single spaces.
    fn command_line_of(&self, pid: u32) -> Option<String>;
}

/// The OS process table exposed through procfs.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }

    /// Use a different procfs mount point (tests point this at a temp dir).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcFs {
    fn command_line_of(&self, pid: u32) -> Option<String> {
        let raw = fs::read(self.root.join(pid.to_string()).join("cmdline")).ok()?;
        join_argv(&raw)
    }
}

/// Pid of the running process.
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Command line of the running process.
///
/// Falls back to `std::env::args` when the process table cannot be read.
pub fn current_command_line(table: &impl ProcessTable) -> String {
    table
        .command_line_of(current_pid())
        .unwrap_or_else(|| sanitize(&std::env::args().collect::<Vec<_>>().join(" ")))
}

/// The program as it was invoked: the first argument of `command_line`.
///
/// Lock records carry only this, like the other UUCP-style clients on the bus.
pub fn program_name(command_line: &str) -> &str {
    command_line.split_whitespace().next().unwrap_or("")
}

/// Turn a NUL-separated argv blob into a single space-separated line.
///
/// Returns `None` for an empty vector (zombies and kernel threads expose an
/// empty cmdline).
fn join_argv(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let joined = text
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let line = sanitize(&joined);
    if line.is_empty() { None } else { Some(line) }
}

// Lock records are a single line.
fn sanitize(line: &str) -> String {
    line.replace(['\n', '\r'], " ").trim_end().to_string()
}
