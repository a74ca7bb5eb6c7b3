//! Command implementations for tac1100.
//!
//! An invocation either reads measurements or writes one setting. Both run
//! inside a single bus session: the serial port lock is taken exclusively,
//! the line is opened, and everything is closed again before returning.

mod output;
mod read;
mod session;
mod write;


pub use output::{OutputMode, Report};
pub use read::{ReadPlan, read_all};
pub use session::{SessionSettings, run_on_bus};
pub use write::{WriteRequest, execute as execute_write};

use crate::cli::Cli;
use crate::config::Config;
use crate::error::{MeterError, Result};
use crate::locks::LockCoordinator;
use crate::modbus::RtuTransport;
use tracing::debug;

/// Dispatch an invocation to its implementation.
///
/// Arguments have been validated and `config` already carries the command
/// line overrides.
pub fn dispatch(cli: &Cli, config: &Config) -> Result<()> {
    let mut coordinator = LockCoordinator::for_device(&cli.device, config.lock_settings())?;
    let serial = config.serial_settings(&cli.device);
    let settings = SessionSettings {
        unit: config.address,
        policy: config.retry_policy(),
        settle_time: config.settle_time(),
    };
    let connect = || {
        RtuTransport::connect(&serial).map_err(|e| MeterError::transport(format!("open of {}", serial), 1, e))
    };

    match cli.write_request() {
        Some(request) => {
            debug!(?request, "write requested");
            let current_password = cli.tuning.current_password;
            run_on_bus(&mut coordinator, settings, connect, |client| {
                execute_write(client, request, current_password)
            })?;
        }
        None => {
            let plan = ReadPlan {
                measurements: cli.measurements(),
                scroll_time: cli.reads.scroll_time,
            };
            debug!(count = plan.measurements.len(), scroll_time = plan.scroll_time, "read requested");
            let report = run_on_bus(&mut coordinator, settings, connect, |client| {
                read_all(client, config.address, &plan)
            })?;
            print!("{}", report.render(cli.output_mode()));
        }
    }

    Ok(())
}
