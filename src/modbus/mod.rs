//! Modbus RTU access to the meter.
//!
//! The [`RegisterTransport`] trait is the seam between the register client and
//! the wire. [`RtuTransport`] implements it over a serial port, with frames
//! built and checked by `rmodbus`. Tests drive the client through a scripted
//! mock instead.

mod rtu;
mod settings;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use rtu::RtuTransport;
pub use settings::{Parity, SerialSettings, StopBits, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
pub use transport::{RegisterTransport, TransportError, exception_name};
