//! Defaults and limits for the Config struct.

use crate::locks::{DEFAULT_COMPATIBLE_CLIENTS, DEFAULT_LOCK_DIR, DEFAULT_LOCK_PREFIX};
use crate::modbus::DEFAULT_BAUD_RATE;
use std::path::PathBuf;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "TAC1100_CONFIG";

/// Longest lock wait accepted, in seconds.
pub const MAX_LOCK_WAIT_SECS: u64 = 30;

/// Largest retry budget accepted.
pub const MAX_ATTEMPTS: u32 = 100;

/// Response timeout limit, in tenths of a second.
pub const MAX_RESPONSE_TIMEOUT_DS: u32 = 500;

/// Byte timeout limit, in milliseconds.
pub const MAX_BYTE_TIMEOUT_MS: u32 = 500;

pub fn default_lock_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCK_DIR)
}

pub fn default_lock_prefix() -> String {
    DEFAULT_LOCK_PREFIX.to_string()
}

pub fn default_max_lock_attempts() -> u32 {
    100
}

pub fn default_poll_interval_ms() -> u64 {
    25
}

pub fn default_stale_confirmations() -> u32 {
    2
}

pub fn default_compatible_clients() -> Vec<String> {
    DEFAULT_COMPATIBLE_CLIENTS.iter().map(|s| s.to_string()).collect()
}

pub fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

pub fn default_address() -> u8 {
    1
}

pub fn default_max_attempts() -> u32 {
    1
}

/// 0.2 s.
pub fn default_response_timeout_ds() -> u32 {
    2
}
