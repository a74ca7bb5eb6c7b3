//! Measurement reads.

use super::output::Report;
use crate::error::Result;
use crate::meter::{ConfigRegister, Measurement, RegisterClient};
use crate::modbus::RegisterTransport;

/// What to read in one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    pub measurements: Vec<Measurement>,
    pub scroll_time: bool,
}

/// Read every planned value; the first value that cannot be read ends the
/// invocation.
pub fn read_all<T: RegisterTransport>(
    client: &mut RegisterClient<T>,
    address: u8,
    plan: &ReadPlan,
) -> Result<Report> {
    let mut report = Report::new(address);

    for measurement in &plan.measurements {
        let value = client.read_measurement(measurement.address(), 2)?;
        report.readings.push((*measurement, value));
    }

    if plan.scroll_time {
        report.scroll_time = Some(client.read_config(ConfigRegister::ScrollTime.address())?);
    }

    Ok(report)
}
