//! Deciding whether the holder named in a lock record is still legitimate.

use super::record::LockRecord;
use crate::process::program_name;
use std::fmt;

/// Command-line tokens of Modbus clients known to share a bus politely.
///
/// Any holder whose live command line contains one of these is treated as a
/// peer. This is a substring heuristic and only a weak guarantee: nothing
/// proves the peer will not collide on the wire. The exclusive bus lock is
/// what actually serializes transactions among peers that honor it.
pub const DEFAULT_COMPATIBLE_CLIENTS: &[&str] = &["sdm120", "tac1100", "aurora", "modbus"];

/// Why a record was judged stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No process with the recorded pid exists.
    ProcessGone,
    /// The pid exists but runs a different command than the one recorded.
    PidReused { live_command: String },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::ProcessGone => write!(f, "process no longer exists"),
            StaleReason::PidReused { live_command } => {
                write!(f, "pid now runs '{}'", live_command)
            }
        }
    }
}

/// Outcome of checking a record against the live process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The holder is gone or was replaced.
    Stale(StaleReason),
    /// The holder is alive and not a known Modbus client: wait for it.
    Valid,
    /// The holder is alive and a known Modbus client: share the bus.
    CompatiblePeer,
}

/// Classifies lock holders.
#[derive(Debug, Clone)]
pub struct StaleHolderPolicy {
    compatible_clients: Vec<String>,
}

impl StaleHolderPolicy {
    pub fn new<I, S>(compatible_clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            compatible_clients: compatible_clients
                .into_iter()
                .map(Into::into)
                .filter(|token: &String| !token.is_empty())
                .collect(),
        }
    }

    /// Judge `record` given the live command line of its pid (`None` when the
    /// process does not exist).
    ///
    /// Records name the holder by program only, so the pid counts as reused
    /// when the live program differs from the recorded one.
    pub fn assess(&self, record: &LockRecord, live_command: Option<&str>) -> Verdict {
        let Some(live) = live_command else {
            return Verdict::Stale(StaleReason::ProcessGone);
        };
        if live.is_empty() {
            return Verdict::Stale(StaleReason::ProcessGone);
        }
        if !record.holder_command.is_empty() && program_name(live) != program_name(&record.holder_command) {
            return Verdict::Stale(StaleReason::PidReused {
                live_command: live.to_string(),
            });
        }
        if self.is_compatible(live) {
            Verdict::CompatiblePeer
        } else {
            Verdict::Valid
        }
    }

    /// Whether `command` looks like a cooperating Modbus client.
    pub fn is_compatible(&self, command: &str) -> bool {
        self.compatible_clients
            .iter()
            .any(|token| command.contains(token.as_str()))
    }
}

impl Default for StaleHolderPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COMPATIBLE_CLIENTS.iter().copied())
    }
}

/// Requires the same anomaly to be observed on consecutive polls before it
/// is acted upon.
///
/// Tolerates the window in which another process is rewriting the record.
#[derive(Debug, Clone)]
pub struct Debounce {
    required: u32,
    target: Option<u32>,
    seen: u32,
}

impl Debounce {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            target: None,
            seen: 0,
        }
    }

    /// Record an anomalous observation about `key`; returns `true` once it has
    /// been seen `required` times in a row.
    pub fn observe(&mut self, key: u32) -> bool {
        if self.target == Some(key) {
            self.seen += 1;
        } else {
            self.target = Some(key);
            self.seen = 1;
        }
        self.seen >= self.required
    }

    /// An observation has been made but not yet confirmed.
    pub fn is_pending(&self) -> bool {
        self.target.is_some() && self.seen < self.required
    }

    /// Observations made so far about the current key.
    pub fn seen(&self) -> u32 {
        self.seen
    }

    pub fn reset(&mut self) {
        self.target = None;
        self.seen = 0;
    }
}
