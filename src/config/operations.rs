//! Config loading, validation, and conversion into runtime settings.

use super::model::Config;
use super::types::{
    CONFIG_ENV_VAR, MAX_ATTEMPTS, MAX_BYTE_TIMEOUT_MS, MAX_LOCK_WAIT_SECS, MAX_RESPONSE_TIMEOUT_DS,
};
use crate::error::{MeterError, Result};
use crate::locks::LockSettings;
use crate::meter::RetryPolicy;
use crate::modbus::{SUPPORTED_BAUD_RATES, SerialSettings};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            MeterError::Usage(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "loaded config file");
        Self::from_yaml(&content)
    }

    /// Load the file named by `explicit`, else by `$TAC1100_CONFIG`, else
    /// return the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match config_path(explicit, std::env::var_os(CONFIG_ENV_VAR)) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| MeterError::Usage(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    #[cfg(test)]
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MeterError::Usage(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Range checks, the same ones the command line applies.
    pub fn validate(&self) -> Result<()> {
        if self.lock_prefix.is_empty() || self.lock_prefix.contains('/') {
            return Err(invalid("lock_prefix must be non-empty and must not contain '/'"));
        }
        if self.lock_wait_secs > MAX_LOCK_WAIT_SECS {
            return Err(invalid(format!(
                "lock_wait_secs must be between 0 and {} (got {})",
                MAX_LOCK_WAIT_SECS, self.lock_wait_secs
            )));
        }
        if self.max_lock_attempts == 0 {
            return Err(invalid("max_lock_attempts must be greater than 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }
        if self.stale_confirmations == 0 {
            return Err(invalid("stale_confirmations must be greater than 0"));
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of {:?} (got {})",
                SUPPORTED_BAUD_RATES, self.baud_rate
            )));
        }
        if !(1..=247).contains(&self.address) {
            return Err(invalid(format!(
                "address must be between 1 and 247 (got {})",
                self.address
            )));
        }
        if !(1..=MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(invalid(format!(
                "max_attempts must be between 1 and {} (got {})",
                MAX_ATTEMPTS, self.max_attempts
            )));
        }
        if !(1..=MAX_RESPONSE_TIMEOUT_DS).contains(&self.response_timeout_ds) {
            return Err(invalid(format!(
                "response_timeout_ds must be between 1 and {} (got {})",
                MAX_RESPONSE_TIMEOUT_DS, self.response_timeout_ds
            )));
        }
        if let Some(ms) = self.byte_timeout_ms
            && !(1..=MAX_BYTE_TIMEOUT_MS).contains(&ms)
        {
            return Err(invalid(format!(
                "byte_timeout_ms must be between 1 and {} (got {})",
                MAX_BYTE_TIMEOUT_MS, ms
            )));
        }

        Ok(())
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            lock_dir: self.lock_dir.clone(),
            lock_prefix: self.lock_prefix.clone(),
            wait: Duration::from_secs(self.lock_wait_secs),
            max_attempts: self.max_lock_attempts,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stale_confirmations: self.stale_confirmations,
            compatible_clients: self.compatible_clients.clone(),
            ..LockSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            inter_attempt_delay: Duration::from_millis(self.command_delay_ms),
            response_timeout: Duration::from_millis(u64::from(self.response_timeout_ds) * 100),
            byte_timeout: self.byte_timeout_ms.map(|ms| Duration::from_millis(u64::from(ms))),
        }
    }

    pub fn serial_settings(&self, device: &str) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            parity: self.parity,
            stop_bits: self.stop_bits,
            ..SerialSettings::new(device)
        }
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }
}

/// The config file to read: `--config` wins over the environment.
pub(super) fn config_path(explicit: Option<&Path>, env: Option<OsString>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env.filter(|value| !value.is_empty()).map(PathBuf::from))
}

fn invalid(message: impl std::fmt::Display) -> MeterError {
    MeterError::Usage(format!("config validation failed: {}", message))
}
