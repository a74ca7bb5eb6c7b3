//! CLI argument parsing for tac1100.
//!
//! Uses clap derive macros for declarative argument definitions. Single
//! letter flags follow the ones other Modbus meter tools on the same bus use
//! (`sdm120c`, `aurora`), so existing cron jobs and loggers keep working.

use crate::commands::{OutputMode, WriteRequest};
use crate::config::Config;
use crate::error::{MeterError, Result};
use crate::meter::{Measurement, ResetKind};
use crate::modbus::{Parity, SUPPORTED_BAUD_RATES, StopBits};
use clap::{Args, Parser};
use std::path::PathBuf;

/// TAC1100: Modbus RTU client for TAC1100 series single phase power meters.
///
/// Without read flags every measurement is read. Only one setting can be
/// written per invocation, and never together with reads.
#[derive(Parser, Debug)]
#[command(name = "tac1100")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Serial device (e.g. /dev/ttyUSB0).
    pub device: String,

    #[command(flatten)]
    pub line: LineArgs,

    #[command(flatten)]
    pub reads: ReadArgs,

    #[command(flatten)]
    pub writes: WriteArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,
}

/// Connection parameters.
#[derive(Args, Debug, Default)]
pub struct LineArgs {
    /// Meter address (1-247). Default: 1.
    #[arg(short = 'a', value_name = "ADDRESS", value_parser = clap::value_parser!(u8).range(1..=247))]
    pub address: Option<u8>,

    /// Serial port speed (1200, 2400, 4800, 9600, 19200). Default: 9600.
    #[arg(short = 'b', value_name = "BAUD_RATE", value_parser = parse_baud_rate)]
    pub baud_rate: Option<u32>,

    /// Parity (E, N, O). Default: N.
    #[arg(short = 'P', value_name = "PARITY")]
    pub parity: Option<Parity>,

    /// Stop bits (1, 2). Default: 1.
    #[arg(short = 'S', value_name = "BITS", value_parser = parse_stop_bits)]
    pub stop_bits: Option<StopBits>,
}

/// Measurements to read.
#[derive(Args, Debug, Default)]
pub struct ReadArgs {
    /// Get voltage (V).
    #[arg(short = 'v')]
    pub voltage: bool,

    /// Get current (A).
    #[arg(short = 'c')]
    pub current: bool,

    /// Get power (W).
    #[arg(short = 'p')]
    pub power: bool,

    /// Get apparent power (VA).
    #[arg(short = 'l')]
    pub apparent_power: bool,

    /// Get reactive power (VAR).
    #[arg(short = 'n')]
    pub reactive_power: bool,

    /// Get power factor.
    #[arg(short = 'g')]
    pub power_factor: bool,

    /// Get phase angle (Degree).
    #[arg(short = 'o')]
    pub phase_angle: bool,

    /// Get frequency (Hz).
    #[arg(short = 'f')]
    pub frequency: bool,

    /// Get imported energy (Wh).
    #[arg(short = 'i')]
    pub import_energy: bool,

    /// Get exported energy (Wh).
    #[arg(short = 'e')]
    pub export_energy: bool,

    /// Get total energy (Wh).
    #[arg(short = 't')]
    pub total_energy: bool,

    /// Get imported reactive energy (VARh).
    #[arg(short = 'A')]
    pub import_reactive_energy: bool,

    /// Get exported reactive energy (VARh).
    #[arg(short = 'B')]
    pub export_reactive_energy: bool,

    /// Get total reactive energy (VARh).
    #[arg(short = 'C')]
    pub total_reactive_energy: bool,

    /// Get time for automatic scroll display (0 = no rotation).
    #[arg(short = 'T')]
    pub scroll_time: bool,
}

/// Settings to write. At most one per invocation.
#[derive(Args, Debug, Default)]
#[group(id = "write", multiple = false)]
pub struct WriteArgs {
    /// Set new meter address (1-247).
    #[arg(short = 's', value_name = "NEW_ADDRESS", value_parser = clap::value_parser!(u8).range(1..=247))]
    pub new_address: Option<u8>,

    /// Set meter speed (1200, 2400, 4800, 9600, 19200).
    #[arg(short = 'r', value_name = "BAUD_RATE", value_parser = parse_baud_rate)]
    pub new_baud_rate: Option<u32>,

    /// Set parity and stop bits (0: N1, 1: E1, 2: O1, 3: N2) [REQUIRES RESTART].
    #[arg(short = 'N', value_name = "PARITY", value_parser = clap::value_parser!(u16).range(0..=3))]
    pub new_parity_stop: Option<u16>,

    /// Set new password (0-9999) [REQUIRES KPPA: use -Q].
    #[arg(short = 'K', value_name = "PASSWORD", value_parser = clap::value_parser!(u16).range(0..=9999))]
    pub new_password: Option<u16>,

    /// Set demand period (0-60 minutes, 0 = update every second).
    #[arg(short = 'L', value_name = "MINUTES", value_parser = clap::value_parser!(u16).range(0..=60))]
    pub demand_period: Option<u16>,

    /// Set slide time (1 to demand period - 1).
    #[arg(short = 'U', value_name = "MINUTES", value_parser = clap::value_parser!(u16).range(1..))]
    pub slide_time: Option<u16>,

    /// Set automatic scroll display time (0-60 seconds, 0 = no rotation).
    #[arg(short = 'R', value_name = "SECONDS", value_parser = clap::value_parser!(u16).range(0..=60))]
    pub new_scroll_time: Option<u16>,

    /// Set backlit time (0-120 or 255 minutes, 0 = always on, 255 = off).
    #[arg(short = 'G', value_name = "MINUTES", value_parser = parse_backlit_time)]
    pub backlit_time: Option<u16>,

    /// Reset historical data (0 = max demand, 8 = monthly, 9 = daily) [REQUIRES KPPA: use -Q].
    #[arg(short = 'H', value_name = "RESET_TYPE", value_parser = parse_reset_kind)]
    pub reset_history: Option<ResetKind>,
}

/// Output format.
#[derive(Args, Debug, Default)]
pub struct OutputArgs {
    /// Output values in IEC 62056 format ID(VALUE*UNIT).
    #[arg(short = 'm', conflicts_with_all = ["compact", "json"])]
    pub iec: bool,

    /// Output values in compact mode.
    #[arg(short = 'q', conflicts_with = "json")]
    pub compact: bool,

    /// Output values as a JSON object.
    #[arg(long)]
    pub json: bool,
}

/// Fine tuning and debug parameters.
#[derive(Args, Debug, Default)]
pub struct TuningArgs {
    /// Current password for KPPA authorization.
    #[arg(short = 'Q', value_name = "PASSWORD", value_parser = clap::value_parser!(u16).range(0..=9999))]
    pub current_password: Option<u16>,

    /// Read attempts before giving up (1-100). Default: 1 (no retry).
    #[arg(short = 'z', value_name = "NUM_RETRIES", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub retries: Option<u32>,

    /// Response timeout in tenths of a second (1-500). Default: 2.
    #[arg(short = 'j', value_name = "DECISECONDS", value_parser = clap::value_parser!(u32).range(1..=500))]
    pub response_timeout: Option<u32>,

    /// Timeout between bytes in milliseconds (1-500). Default: disabled.
    #[arg(short = 'y', value_name = "MILLISECONDS", value_parser = clap::value_parser!(u32).range(1..=500))]
    pub byte_timeout: Option<u32>,

    /// Delay before sending commands, in milliseconds. Default: 0.
    #[arg(short = 'D', value_name = "MILLISECONDS")]
    pub command_delay: Option<u64>,

    /// Time to wait for the serial port lock (0-30 s). Default: 0.
    #[arg(short = 'w', value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(0..=30))]
    pub lock_wait: Option<u64>,

    /// Time to wait for the RS485 line to settle, in milliseconds. Default: 0.
    #[arg(short = 'W', value_name = "MILLISECONDS")]
    pub settle_time: Option<u64>,

    /// Debug level (0 = warnings, 1 = debug, 2 = info, 3 = debug with lock details).
    #[arg(short = 'd', value_name = "LEVEL", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub debug: u8,

    /// Trace raw Modbus frames.
    #[arg(short = 'x')]
    pub trace: bool,

    /// Config file (default: $TAC1100_CONFIG).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding serial port lock files.
    #[arg(long, value_name = "DIR")]
    pub lock_dir: Option<PathBuf>,
}

impl Cli {
    /// Checks clap cannot express: reads and writes don't mix, and KPPA
    /// writes need the current password. `-Q` is ignored by every other
    /// operation.
    pub fn validate(&self) -> Result<()> {
        let write = self.write_request();

        if write.is_some() && self.reads.any() {
            return Err(MeterError::Usage(
                "read and write parameters are mutually exclusive".to_string(),
            ));
        }

        match (&write, self.tuning.current_password) {
            (Some(request), None) if request.requires_authorization() => {
                Err(MeterError::Usage(format!(
                    "{} requires the current password for KPPA authorization (use -Q)",
                    request.register().name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Measurements to read, in output order. No flag at all means every
    /// measurement; `-T` alone means none.
    pub fn measurements(&self) -> Vec<Measurement> {
        let selected: Vec<Measurement> = Measurement::ALL
            .into_iter()
            .filter(|m| self.reads.is_selected(*m))
            .collect();

        if selected.is_empty() && !self.reads.scroll_time {
            Measurement::ALL.to_vec()
        } else {
            selected
        }
    }

    pub fn write_request(&self) -> Option<WriteRequest> {
        let w = &self.writes;
        if let Some(address) = w.new_address {
            return Some(WriteRequest::Address(address));
        }
        if let Some(baud_rate) = w.new_baud_rate {
            return Some(WriteRequest::BaudRate(baud_rate));
        }
        if let Some(code) = w.new_parity_stop {
            return Some(WriteRequest::ParityStop(code));
        }
        if let Some(password) = w.new_password {
            return Some(WriteRequest::Password(password));
        }
        if let Some(minutes) = w.demand_period {
            return Some(WriteRequest::DemandPeriod(minutes));
        }
        if let Some(minutes) = w.slide_time {
            return Some(WriteRequest::SlideTime(minutes));
        }
        if let Some(seconds) = w.new_scroll_time {
            return Some(WriteRequest::ScrollTime(seconds));
        }
        if let Some(minutes) = w.backlit_time {
            return Some(WriteRequest::BacklitTime(minutes));
        }
        w.reset_history.map(WriteRequest::ResetHistory)
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.output.iec {
            OutputMode::Iec
        } else if self.output.compact {
            OutputMode::Compact
        } else if self.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    /// Let flags given on the command line win over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(address) = self.line.address {
            config.address = address;
        }
        if let Some(baud_rate) = self.line.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(parity) = self.line.parity {
            config.parity = parity;
        }
        if let Some(stop_bits) = self.line.stop_bits {
            config.stop_bits = stop_bits;
        }

        let t = &self.tuning;
        if let Some(retries) = t.retries {
            config.max_attempts = retries;
        }
        if let Some(deciseconds) = t.response_timeout {
            config.response_timeout_ds = deciseconds;
        }
        if let Some(ms) = t.byte_timeout {
            config.byte_timeout_ms = Some(ms);
        }
        if let Some(ms) = t.command_delay {
            config.command_delay_ms = ms;
        }
        if let Some(secs) = t.lock_wait {
            config.lock_wait_secs = secs;
        }
        if let Some(ms) = t.settle_time {
            config.settle_time_ms = ms;
        }
        if let Some(dir) = &t.lock_dir {
            config.lock_dir = dir.clone();
        }
    }
}

impl ReadArgs {
    fn any(&self) -> bool {
        self.scroll_time || Measurement::ALL.into_iter().any(|m| self.is_selected(m))
    }

    fn is_selected(&self, measurement: Measurement) -> bool {
        match measurement {
            Measurement::Voltage => self.voltage,
            Measurement::Current => self.current,
            Measurement::ActivePower => self.power,
            Measurement::ApparentPower => self.apparent_power,
            Measurement::ReactivePower => self.reactive_power,
            Measurement::PowerFactor => self.power_factor,
            Measurement::PhaseAngle => self.phase_angle,
            Measurement::Frequency => self.frequency,
            Measurement::ImportActiveEnergy => self.import_energy,
            Measurement::ExportActiveEnergy => self.export_energy,
            Measurement::TotalActiveEnergy => self.total_energy,
            Measurement::ImportReactiveEnergy => self.import_reactive_energy,
            Measurement::ExportReactiveEnergy => self.export_reactive_energy,
            Measurement::TotalReactiveEnergy => self.total_reactive_energy,
        }
    }
}

fn parse_baud_rate(s: &str) -> std::result::Result<u32, String> {
    let rate: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if SUPPORTED_BAUD_RATES.contains(&rate) {
        Ok(rate)
    } else {
        Err("baud rate must be one of 1200, 2400, 4800, 9600, 19200".to_string())
    }
}

fn parse_stop_bits(s: &str) -> std::result::Result<StopBits, String> {
    let bits: u8 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    StopBits::try_from(bits)
}

fn parse_backlit_time(s: &str) -> std::result::Result<u16, String> {
    let minutes: u16 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if minutes <= 120 || minutes == 255 {
        Ok(minutes)
    } else {
        Err(format!("backlit time ({}) out of range, 0-120 or 255", minutes))
    }
}

fn parse_reset_kind(s: &str) -> std::result::Result<ResetKind, String> {
    let code: u16 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    ResetKind::from_code(code).ok_or_else(|| format!("reset type ({}) must be 0, 8 or 9", code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tac1100"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn parse_err(args: &[&str]) -> ErrorKind {
        let mut argv = vec!["tac1100"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap_err().kind()
    }

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_device_only_reads_everything() {
        let cli = parse(&["/dev/ttyUSB0"]);
        assert_eq!(cli.device, "/dev/ttyUSB0");
        assert_eq!(cli.measurements(), Measurement::ALL.to_vec());
        assert!(cli.write_request().is_none());
        assert_eq!(cli.output_mode(), OutputMode::Human);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn parse_selected_reads_keep_output_order() {
        let cli = parse(&["-f", "-v", "-C", "/dev/ttyUSB0"]);
        assert_eq!(
            cli.measurements(),
            vec![
                Measurement::Voltage,
                Measurement::Frequency,
                Measurement::TotalReactiveEnergy
            ]
        );
    }

    #[test]
    fn parse_scroll_time_alone_reads_no_measurement() {
        let cli = parse(&["-T", "/dev/ttyUSB0"]);
        assert!(cli.measurements().is_empty());
        assert!(cli.reads.scroll_time);
    }

    #[test]
    fn scroll_time_read_and_write_are_distinct_flags() {
        let cli = parse(&["-R", "5", "/dev/ttyUSB0"]);
        assert_eq!(cli.writes.new_scroll_time, Some(5));
        assert!(!cli.reads.scroll_time);
        assert_eq!(cli.write_request(), Some(WriteRequest::ScrollTime(5)));
        assert!(cli.validate().is_ok());

        let cli = parse(&["-T", "/dev/ttyUSB0"]);
        assert!(cli.reads.scroll_time);
        assert_eq!(cli.writes.new_scroll_time, None);
        assert!(cli.write_request().is_none());

        assert_eq!(parse_err(&["-R", "61", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
    }

    #[test]
    fn parse_line_settings() {
        let cli = parse(&["-a", "12", "-b", "19200", "-P", "E", "-S", "2", "/dev/ttyUSB0"]);
        assert_eq!(cli.line.address, Some(12));
        assert_eq!(cli.line.baud_rate, Some(19200));
        assert_eq!(cli.line.parity, Some(Parity::Even));
        assert_eq!(cli.line.stop_bits, Some(StopBits::Two));
    }

    #[test]
    fn parse_rejects_out_of_range_values() {
        assert_eq!(parse_err(&["-a", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-a", "248", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-b", "115200", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-P", "X", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-S", "3", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-z", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-z", "101", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-j", "501", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-y", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-w", "31", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-d", "4", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-G", "121", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-H", "1", "-Q", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-K", "10000", "-Q", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-N", "4", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-L", "61", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
        assert_eq!(parse_err(&["-U", "0", "/dev/ttyUSB0"]), ErrorKind::ValueValidation);
    }

    #[test]
    fn parse_backlit_accepts_off() {
        let cli = parse(&["-G", "255", "/dev/ttyUSB0"]);
        assert_eq!(cli.write_request(), Some(WriteRequest::BacklitTime(255)));
    }

    #[test]
    fn parse_requires_device() {
        assert_eq!(parse_err(&["-v"]), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn output_modes_are_exclusive() {
        assert_eq!(parse_err(&["-m", "-q", "/dev/ttyUSB0"]), ErrorKind::ArgumentConflict);
        assert_eq!(parse_err(&["-q", "--json", "/dev/ttyUSB0"]), ErrorKind::ArgumentConflict);
        assert_eq!(parse(&["-m", "/dev/ttyUSB0"]).output_mode(), OutputMode::Iec);
        assert_eq!(parse(&["-q", "/dev/ttyUSB0"]).output_mode(), OutputMode::Compact);
        assert_eq!(parse(&["--json", "/dev/ttyUSB0"]).output_mode(), OutputMode::Json);
    }

    #[test]
    fn only_one_write_per_invocation() {
        assert_eq!(parse_err(&["-s", "2", "-r", "9600", "/dev/ttyUSB0"]), ErrorKind::ArgumentConflict);
        assert_eq!(parse_err(&["-s", "2", "-N", "1", "/dev/ttyUSB0"]), ErrorKind::ArgumentConflict);
        assert_eq!(parse_err(&["-L", "10", "-U", "2", "/dev/ttyUSB0"]), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn writes_and_reads_are_exclusive() {
        let cli = parse(&["-s", "2", "-v", "/dev/ttyUSB0"]);
        let err = cli.validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }

    #[test]
    fn protected_writes_need_current_password() {
        assert!(parse(&["-K", "1234", "/dev/ttyUSB0"]).validate().is_err());
        assert!(parse(&["-H", "8", "/dev/ttyUSB0"]).validate().is_err());

        let cli = parse(&["-Q", "0", "-K", "1234", "/dev/ttyUSB0"]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.write_request(), Some(WriteRequest::Password(1234)));

        let cli = parse(&["-Q", "1234", "-H", "9", "/dev/ttyUSB0"]);
        assert!(cli.validate().is_ok());
        assert_eq!(
            cli.write_request(),
            Some(WriteRequest::ResetHistory(ResetKind::Daily))
        );
    }

    #[test]
    fn current_password_is_ignored_without_protected_write() {
        assert!(parse(&["-Q", "0", "/dev/ttyUSB0"]).validate().is_ok());

        let cli = parse(&["-Q", "0", "-s", "3", "/dev/ttyUSB0"]);
        assert!(cli.validate().is_ok());
        assert_eq!(cli.write_request(), Some(WriteRequest::Address(3)));
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = parse(&[
            "-a", "7", "-b", "2400", "-P", "O", "-z", "3", "-j", "10", "-y", "20", "-D", "15",
            "-w", "5", "-W", "40", "--lock-dir", "/run/lock", "/dev/ttyUSB0",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.address, 7);
        assert_eq!(config.baud_rate, 2400);
        assert_eq!(config.parity, Parity::Odd);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.response_timeout_ds, 10);
        assert_eq!(config.byte_timeout_ms, Some(20));
        assert_eq!(config.command_delay_ms, 15);
        assert_eq!(config.lock_wait_secs, 5);
        assert_eq!(config.settle_time_ms, 40);
        assert_eq!(config.lock_dir, PathBuf::from("/run/lock"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_leave_unset_values_alone() {
        let cli = parse(&["/dev/ttyUSB0"]);
        let mut config = Config {
            address: 42,
            ..Config::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.address, 42);
        assert_eq!(config.byte_timeout_ms, None);
    }
}
