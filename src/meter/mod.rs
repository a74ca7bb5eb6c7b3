//! The TAC1100 meter: its register map, value decoding, and a retrying
//! register client.

mod client;
mod decode;
mod registers;

#[cfg(test)]
mod tests;

pub use client::{
    Bank, Encoding, RegisterClient, RegisterRequest, RegisterValue, RetryPolicy, WriteOutcome,
};
pub use decode::{bcd_to_num, decode_float};
pub use registers::{ConfigRegister, Measurement, ResetKind};
