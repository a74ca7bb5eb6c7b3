//! Config struct definition and default implementation.

use super::types::*;
use crate::modbus::{Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one tac1100 invocation.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Directory holding UUCP-style lock records (default: "/var/lock").
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,

    /// Prefix prepended to the device base name (default: "LCK..").
    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,

    /// Seconds to wait for another holder to let go (0 fails immediately).
    #[serde(default)]
    pub lock_wait_secs: u64,

    /// Hard bound on acquisition polls.
    #[serde(default = "default_max_lock_attempts")]
    pub max_lock_attempts: u32,

    /// Base delay between acquisition polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls a stale or corrupt record must be seen on before it is removed.
    #[serde(default = "default_stale_confirmations")]
    pub stale_confirmations: u32,

    /// Command-line tokens of clients allowed to share the bus.
    #[serde(default = "default_compatible_clients")]
    pub compatible_clients: Vec<String>,

    // =========================================================================
    // Serial line
    // =========================================================================
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default)]
    pub parity: Parity,

    #[serde(default)]
    pub stop_bits: StopBits,

    /// Modbus slave address of the meter.
    #[serde(default = "default_address")]
    pub address: u8,

    // =========================================================================
    // Register I/O
    // =========================================================================
    /// Attempts per read.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Response timeout in tenths of a second.
    #[serde(default = "default_response_timeout_ds")]
    pub response_timeout_ds: u32,

    /// Inter-byte timeout in milliseconds; absent disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_timeout_ms: Option<u32>,

    /// Pause before every command, in milliseconds.
    #[serde(default)]
    pub command_delay_ms: u64,

    /// Pause after opening the line, before the first command.
    #[serde(default)]
    pub settle_time_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            lock_prefix: default_lock_prefix(),
            lock_wait_secs: 0,
            max_lock_attempts: default_max_lock_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            stale_confirmations: default_stale_confirmations(),
            compatible_clients: default_compatible_clients(),
            baud_rate: default_baud_rate(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            address: default_address(),
            max_attempts: default_max_attempts(),
            response_timeout_ds: default_response_timeout_ds(),
            byte_timeout_ms: None,
            command_delay_ms: 0,
            settle_time_ms: 0,
        }
    }
}
