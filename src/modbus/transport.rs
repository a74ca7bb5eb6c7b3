//! The register transport seam.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single request/response exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("response timeout")]
    Timeout,

    /// The meter answered with a Modbus exception.
    #[error("device exception {code:#04x} ({})", exception_name(*.code))]
    Exception { code: u8 },

    #[error("invalid response frame: {0}")]
    Frame(String),

    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Modbus exception 0x01: the function is not allowed on this register.
    pub fn is_illegal_function(&self) -> bool {
        matches!(self, TransportError::Exception { code: 0x01 })
    }
}

/// Name of a standard Modbus exception code.
pub fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "slave device failure",
        0x05 => "acknowledge",
        0x06 => "slave device busy",
        0x08 => "memory parity error",
        0x0A => "gateway path unavailable",
        0x0B => "gateway target device failed to respond",
        _ => "unknown exception",
    }
}

/// Request/response access to a Modbus slave.
///
/// One call is one exchange on the wire; retrying is the caller's business.
pub trait RegisterTransport {
    /// Address of the slave subsequent requests go to.
    fn set_slave(&mut self, unit: u8);

    /// How long to wait for the first byte of a response.
    fn set_response_timeout(&mut self, timeout: Duration);

    /// Maximum gap between bytes of a response; `None` disables the check.
    fn set_byte_timeout(&mut self, timeout: Option<Duration>);

    /// Function 0x04.
    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// Function 0x03.
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// Function 0x10.
    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError>;

    /// Close the connection. Later exchanges fail with [`TransportError::Closed`].
    fn close(&mut self);
}
