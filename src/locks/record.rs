//! Lock record encoding and parsing.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Contents of a serial port lock file.
///
/// Encoded as `"<pid>[ <command>]\n"`. The pid is mandatory; the command line
/// is optional and separated from the pid by a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// Process ID of the holder.
    pub holder_pid: u32,

    /// Command line of the holder when the record was written (may be empty).
    pub holder_command: String,
}

/// Why a lock file could not be read as a [`LockRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("lock file is empty")]
    Empty,

    #[error("lock file is not newline terminated")]
    Unterminated,

    #[error("lock file has more than one line")]
    TrailingData,

    #[error("lock file has no pid")]
    MissingPid,

    #[error("lock file pid '{0}' is not a positive integer")]
    InvalidPid(String),

    #[error("lock file is not valid UTF-8")]
    NotUtf8,
}

impl LockRecord {
    pub fn new(holder_pid: u32, holder_command: impl Into<String>) -> Self {
        Self {
            holder_pid,
            holder_command: holder_command.into(),
        }
    }

    /// Whether this record names `pid` as its holder.
    pub fn names(&self, pid: u32) -> bool {
        self.holder_pid == pid
    }

    /// Serialize to the on-disk line, newline included.
    pub fn encode(&self) -> String {
        if self.holder_command.is_empty() {
            format!("{}\n", self.holder_pid)
        } else {
            format!("{} {}\n", self.holder_pid, self.holder_command)
        }
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.holder_command.is_empty() {
            write!(f, "pid {}", self.holder_pid)
        } else {
            write!(f, "pid {} ({})", self.holder_pid, self.holder_command)
        }
    }
}

impl FromStr for LockRecord {
    type Err = RecordParseError;

    /// Strict parse: exactly one newline-terminated line.
    ///
    /// Leading spaces before the pid are accepted because HDB UUCP lock files
    /// written by other tools pad the pid to ten columns.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(RecordParseError::Empty);
        }
        let line = s.strip_suffix('\n').ok_or(RecordParseError::Unterminated)?;
        if line.contains('\n') {
            return Err(RecordParseError::TrailingData);
        }

        let line = line.trim_start_matches(' ');
        let (pid_text, command) = match line.split_once(' ') {
            Some((pid, rest)) => (pid, rest.trim_start_matches(' ')),
            None => (line, ""),
        };

        if pid_text.is_empty() {
            return Err(RecordParseError::MissingPid);
        }
        if !pid_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RecordParseError::InvalidPid(pid_text.to_string()));
        }
        let holder_pid = pid_text
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid > 0)
            .ok_or_else(|| RecordParseError::InvalidPid(pid_text.to_string()))?;

        Ok(Self::new(holder_pid, command))
    }
}
