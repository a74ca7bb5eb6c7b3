//! tac1100: Modbus RTU client for TAC1100 series power meters.
//!
//! This is the main entry point for the `tac1100` CLI. It parses arguments,
//! merges them with the config file, runs one bus session, and maps errors
//! to exit codes.

mod cli;
mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
mod logging;
pub mod meter;
pub mod modbus;
pub mod process;
pub mod retry;

#[cfg(test)]
mod test_support;

use clap::Parser;
use clap::error::ErrorKind;
use cli::Cli;
use config::Config;
use error::Result;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout, everything else to stderr
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit(exit_codes::SUCCESS),
                _ => exit(exit_codes::USAGE_ERROR),
            };
        }
    };

    logging::init(cli.tuning.debug, cli.tuning.trace);

    let prints_status = cli.output_mode().prints_status();
    match run(&cli) {
        Ok(()) => {
            if prints_status {
                println!("OK");
            }
            exit(exit_codes::SUCCESS)
        }
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            if prints_status {
                println!("NOK");
            }
            exit(err.exit_code())
        }
    }
}

/// Validate everything before the serial port is touched, then dispatch.
fn run(cli: &Cli) -> Result<()> {
    cli.validate()?;

    let mut config = Config::discover(cli.tuning.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    commands::dispatch(cli, &config)
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}
