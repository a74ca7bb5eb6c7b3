//! Tests for config functionality.

use super::operations::config_path;
use crate::config::Config;
use crate::exit_codes;
use crate::modbus::{Parity, StopBits};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.lock_dir, PathBuf::from("/var/lock"));
    assert_eq!(config.lock_prefix, "LCK..");
    assert_eq!(config.lock_wait_secs, 0);
    assert_eq!(config.max_lock_attempts, 100);
    assert_eq!(config.stale_confirmations, 2);
    assert!(config.compatible_clients.iter().any(|c| c == "tac1100"));
    assert_eq!(config.baud_rate, 9600);
    assert_eq!(config.parity, Parity::None);
    assert_eq!(config.stop_bits, StopBits::One);
    assert_eq!(config.address, 1);
    assert_eq!(config.max_attempts, 1);
    assert_eq!(config.response_timeout_ds, 2);
    assert_eq!(config.byte_timeout_ms, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
baud_rate: 19200
parity: E
address: 12
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.baud_rate, 19200);
    assert_eq!(config.parity, Parity::Even);
    assert_eq!(config.address, 12);

    // Unspecified values keep their defaults
    assert_eq!(config.stop_bits, StopBits::One);
    assert_eq!(config.lock_prefix, "LCK..");
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
lock_dir: /run/lock
lock_prefix: "LCK.."
lock_wait_secs: 5
max_lock_attempts: 40
poll_interval_ms: 10
stale_confirmations: 3
compatible_clients:
  - tac1100
  - sdm120
baud_rate: 4800
parity: O
stop_bits: 2
address: 247
max_attempts: 3
response_timeout_ds: 10
byte_timeout_ms: 50
command_delay_ms: 30
settle_time_ms: 100
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.lock_dir, PathBuf::from("/run/lock"));
    assert_eq!(config.lock_wait_secs, 5);
    assert_eq!(config.compatible_clients, vec!["tac1100", "sdm120"]);
    assert_eq!(config.parity, Parity::Odd);
    assert_eq!(config.stop_bits, StopBits::Two);
    assert_eq!(config.byte_timeout_ms, Some(50));
    assert_eq!(config.settle_time_ms, 100);
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
address: 3
future_option: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.address, 3);
}

#[test]
fn test_invalid_yaml_is_usage_error() {
    let err = Config::from_yaml("address: [1, 2").unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);

    let err = Config::from_yaml("stop_bits: 3").unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
}

#[test]
fn test_validation_ranges() {
    let cases = [
        "lock_wait_secs: 31",
        "max_lock_attempts: 0",
        "poll_interval_ms: 0",
        "stale_confirmations: 0",
        "baud_rate: 115200",
        "address: 0",
        "address: 248",
        "max_attempts: 0",
        "max_attempts: 101",
        "response_timeout_ds: 0",
        "response_timeout_ds: 501",
        "byte_timeout_ms: 0",
        "byte_timeout_ms: 501",
        "lock_prefix: \"\"",
        "lock_prefix: a/b",
    ];

    for yaml in cases {
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains("config validation failed"),
            "{yaml}: {err}"
        );
    }
}

#[test]
fn test_yaml_roundtrip() {
    let config = Config {
        address: 9,
        byte_timeout_ms: Some(20),
        ..Config::default()
    };
    let parsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_runtime_settings() {
    let config = Config {
        lock_wait_secs: 4,
        poll_interval_ms: 15,
        max_attempts: 3,
        response_timeout_ds: 15,
        byte_timeout_ms: Some(40),
        command_delay_ms: 25,
        baud_rate: 2400,
        stop_bits: StopBits::Two,
        settle_time_ms: 80,
        ..Config::default()
    };

    let lock = config.lock_settings();
    assert_eq!(lock.wait, Duration::from_secs(4));
    assert_eq!(lock.poll_interval, Duration::from_millis(15));
    assert_eq!(lock.max_attempts, 100);

    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.response_timeout, Duration::from_millis(1500));
    assert_eq!(policy.byte_timeout, Some(Duration::from_millis(40)));
    assert_eq!(policy.inter_attempt_delay, Duration::from_millis(25));

    let serial = config.serial_settings("/dev/ttyUSB1");
    assert_eq!(serial.device, "/dev/ttyUSB1");
    assert_eq!(serial.baud_rate, 2400);
    assert_eq!(serial.stop_bits, StopBits::Two);
    assert_eq!(serial.to_string(), "/dev/ttyUSB1 24008N2");

    assert_eq!(config.settle_time(), Duration::from_millis(80));
}

#[test]
fn test_config_path_precedence() {
    let explicit = Path::new("/etc/tac1100.yaml");
    let env = Some(OsString::from("/home/meter/tac1100.yaml"));

    assert_eq!(config_path(Some(explicit), env.clone()), Some(explicit.to_path_buf()));
    assert_eq!(
        config_path(None, env),
        Some(PathBuf::from("/home/meter/tac1100.yaml"))
    );
    assert_eq!(config_path(None, Some(OsString::new())), None);
    assert_eq!(config_path(None, None), None);
}

#[test]
fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tac1100.yaml");
    std::fs::write(&path, "address: 5\nlock_wait_secs: 2\n").unwrap();

    let config = Config::discover(Some(&path)).unwrap();
    assert_eq!(config.address, 5);
    assert_eq!(config.lock_wait_secs, 2);
}

#[test]
fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(temp.path().join("missing.yaml")).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USAGE_ERROR);
    assert!(err.to_string().contains("failed to read config file"));
}
