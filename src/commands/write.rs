//! Configuration writes.

use crate::error::{MeterError, Result};
use crate::meter::{ConfigRegister, RegisterClient, ResetKind, WriteOutcome};
use crate::modbus::{RegisterTransport, SUPPORTED_BAUD_RATES};
use tracing::debug;

/// A single configuration change, already range checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRequest {
    Address(u8),
    /// Line speed in baud; written as its register code.
    BaudRate(u32),
    /// 0: N1, 1: E1, 2: O1, 3: N2.
    ParityStop(u16),
    Password(u16),
    DemandPeriod(u16),
    SlideTime(u16),
    ScrollTime(u16),
    BacklitTime(u16),
    ResetHistory(ResetKind),
}

impl WriteRequest {
    pub fn register(&self) -> ConfigRegister {
        match self {
            WriteRequest::Address(_) => ConfigRegister::DeviceId,
            WriteRequest::BaudRate(_) => ConfigRegister::BaudRate,
            WriteRequest::ParityStop(_) => ConfigRegister::ParityStop,
            WriteRequest::Password(_) => ConfigRegister::Password,
            WriteRequest::DemandPeriod(_) => ConfigRegister::DemandPeriod,
            WriteRequest::SlideTime(_) => ConfigRegister::SlideTime,
            WriteRequest::ScrollTime(_) => ConfigRegister::ScrollTime,
            WriteRequest::BacklitTime(_) => ConfigRegister::BacklitTime,
            WriteRequest::ResetHistory(_) => ConfigRegister::ResetHistory,
        }
    }

    /// The raw register value.
    pub fn value(&self) -> Result<u16> {
        match *self {
            WriteRequest::Address(address) => Ok(u16::from(address)),
            WriteRequest::BaudRate(rate) => SUPPORTED_BAUD_RATES
                .iter()
                .position(|supported| *supported == rate)
                .map(|code| code as u16)
                .ok_or_else(|| {
                    MeterError::Usage(format!(
                        "baud rate must be one of 1200, 2400, 4800, 9600, 19200 (got {})",
                        rate
                    ))
                }),
            WriteRequest::ParityStop(code) => Ok(code),
            WriteRequest::Password(password) => Ok(password),
            WriteRequest::DemandPeriod(minutes) => Ok(minutes),
            WriteRequest::SlideTime(minutes) => Ok(minutes),
            WriteRequest::ScrollTime(seconds) => Ok(seconds),
            WriteRequest::BacklitTime(minutes) => Ok(minutes),
            WriteRequest::ResetHistory(kind) => Ok(kind.code()),
        }
    }

    pub fn requires_authorization(&self) -> bool {
        self.register().requires_authorization()
    }
}

/// Perform `request`, unlocking the meter with `current_password` first when
/// the register is protected. Progress goes to stdout.
pub fn execute<T: RegisterTransport>(
    client: &mut RegisterClient<T>,
    request: WriteRequest,
    current_password: Option<u16>,
) -> Result<WriteOutcome> {
    let register = request.register();
    let value = request.value()?;
    debug!(register = %register, value, "writing configuration");

    if request.requires_authorization() {
        let password = current_password
            .ok_or_else(|| MeterError::AuthorizationRequired(register.name().to_string()))?;

        println!("Enabling KPPA authorization...");
        client.authorize(password)?;
        match request {
            WriteRequest::ResetHistory(_) => println!("KPPA enabled. Sending reset command..."),
            _ => println!("KPPA enabled. Changing password..."),
        }
    }

    let outcome = client.write_register(register, value)?;
    println!(
        "New value {} for address 0x{:X} successfully written",
        outcome.value, outcome.address
    );

    if outcome.restart_required {
        println!();
        println!("*******************************************************");
        println!("*** ATTENTION: METER RESTART REQUIRED               ***");
        println!("*** Please restart the meter to apply the changes   ***");
        println!("*******************************************************");
        println!();
    }

    match request {
        WriteRequest::Password(new) => {
            println!();
            println!(
                "Password changed successfully from {} to {}.",
                current_password.unwrap_or_default(),
                new
            );
            println!("IMPORTANT: Remember your new password!");
        }
        WriteRequest::ResetHistory(kind) => {
            println!();
            println!("Historical data reset command executed successfully.");
            println!("Reset type: {}", kind.description());
        }
        _ => {}
    }

    Ok(outcome)
}
