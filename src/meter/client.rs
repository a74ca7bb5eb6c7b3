//! Retrying register client.

use super::decode::{bcd_to_num, decode_float};
use super::registers::ConfigRegister;
use crate::error::{MeterError, Result};
use crate::modbus::{RegisterTransport, TransportError};
use crate::retry::Backoff;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Retry and timing rules for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per read, at least one.
    pub max_attempts: u32,

    /// Pause before every attempt (and before writes).
    pub inter_attempt_delay: Duration,

    pub response_timeout: Duration,

    /// `None` disables the inter-byte check.
    pub byte_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            inter_attempt_delay: Duration::ZERO,
            response_timeout: Duration::from_millis(200),
            byte_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Input,
    Holding,
}

impl Bank {
    fn describe(self) -> &'static str {
        match self {
            Bank::Input => "input",
            Bank::Holding => "holding",
        }
    }
}

/// How the words of a register block are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw16,
    Float32,
    Bcd,
    Uint16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest {
    pub address: u16,
    pub count: u16,
    pub bank: Bank,
    pub encoding: Encoding,
}

impl RegisterRequest {
    /// A 2-word float in the input registers.
    pub fn measurement(address: u16) -> Self {
        Self {
            address,
            count: 2,
            bank: Bank::Input,
            encoding: Encoding::Float32,
        }
    }

    /// A single holding register.
    pub fn config(address: u16) -> Self {
        Self {
            address,
            count: 1,
            bank: Bank::Holding,
            encoding: Encoding::Uint16,
        }
    }

    fn describe(&self) -> String {
        format!("read of {} register 0x{:04X}", self.bank.describe(), self.address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterValue {
    Raw(Vec<u16>),
    Float(f32),
    Bcd(u64),
    Uint(u16),
}

/// Result of a successful configuration write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub address: u16,
    pub value: u16,

    /// Advisory: the meter only applies the value after a power cycle.
    pub restart_required: bool,
}

/// Register access with bounded retries over a [`RegisterTransport`].
///
/// Built only once the bus lock is held exclusively.
pub struct RegisterClient<T: RegisterTransport> {
    transport: T,
    policy: RetryPolicy,
    authorized: bool,
}

impl<T: RegisterTransport> RegisterClient<T> {
    /// Wrap `transport`, addressing slave `unit` with the timeouts of `policy`.
    pub fn new(mut transport: T, unit: u8, policy: RetryPolicy) -> Self {
        transport.set_slave(unit);
        transport.set_response_timeout(policy.response_timeout);
        transport.set_byte_timeout(policy.byte_timeout);
        debug!(
            unit,
            response_timeout_ms = policy.response_timeout.as_millis() as u64,
            byte_timeout_ms = policy.byte_timeout.map(|t| t.as_millis() as u64),
            "register client ready"
        );

        Self {
            transport,
            policy,
            authorized: false,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Read and decode a register block, retrying up to `max_attempts` times.
    ///
    /// A malformed answer counts as a failed attempt.
    pub fn read(&mut self, request: &RegisterRequest) -> Result<RegisterValue> {
        let max_attempts = self.policy.max_attempts;
        let transport = &mut self.transport;

        Backoff::new(max_attempts, self.policy.inter_attempt_delay)
            .retry(|attempt| {
                debug!(
                    attempt,
                    max_attempts,
                    address = format_args!("0x{:04X}", request.address),
                    "reading {} registers",
                    request.bank.describe()
                );
                let started = Instant::now();
                let words = match request.bank {
                    Bank::Input => transport.read_input_registers(request.address, request.count),
                    Bank::Holding => transport.read_holding_registers(request.address, request.count),
                };
                let elapsed_us = started.elapsed().as_micros() as u64;

                match words.and_then(|words| decode(request, words)) {
                    Ok(value) => {
                        debug!(elapsed_us, "read ok");
                        Ok(value)
                    }
                    Err(e) => {
                        if attempt == max_attempts {
                            warn!(attempt, max_attempts, elapsed_us, error = %e, "read failed");
                        } else {
                            debug!(attempt, max_attempts, elapsed_us, error = %e, "read failed");
                        }
                        Err(e)
                    }
                }
            })
            .map_err(|exhausted| {
                MeterError::transport(request.describe(), exhausted.attempts, exhausted.last_error)
            })
    }

    /// Read a float measurement from the input registers.
    pub fn read_measurement(&mut self, address: u16, count: u16) -> Result<f32> {
        let request = RegisterRequest {
            count,
            ..RegisterRequest::measurement(address)
        };
        match self.read(&request)? {
            RegisterValue::Float(value) => Ok(value),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Read one holding register.
    pub fn read_config(&mut self, address: u16) -> Result<u16> {
        let request = RegisterRequest::config(address);
        match self.read(&request)? {
            RegisterValue::Uint(value) => Ok(value),
            other => Err(unexpected(&request, &other)),
        }
    }

    /// Write one holding register, once.
    ///
    /// The meter only implements function 0x10, so even a single register is
    /// written as a block.
    pub fn write_config(&mut self, address: u16, value: u16, requires_restart: bool) -> Result<WriteOutcome> {
        self.pause_before_command();
        debug!(value, address = format_args!("0x{:04X}", address), "writing holding register");

        if let Err(e) = self.transport.write_multiple_registers(address, &[value]) {
            if e.is_illegal_function() {
                warn!(
                    "parameter may be read-only or need KPPA authorization (use -Q with the current password)"
                );
            }
            return Err(MeterError::transport(
                format!("write of holding register 0x{:04X}", address),
                1,
                e,
            ));
        }

        info!(value, address = format_args!("0x{:04X}", address), "register written");
        Ok(WriteOutcome {
            address,
            value,
            restart_required: requires_restart,
        })
    }

    /// Unlock protected registers by writing the current password to KPPA.
    ///
    /// The authorization lasts for this client only.
    pub fn authorize(&mut self, password: u16) -> Result<()> {
        self.pause_before_command();
        debug!("enabling KPPA authorization");

        match self
            .transport
            .write_multiple_registers(ConfigRegister::Kppa.address(), &[password])
        {
            Ok(()) => {
                self.authorized = true;
                info!("KPPA authorization enabled");
                Ok(())
            }
            Err(e @ TransportError::Exception { .. }) => Err(MeterError::AuthorizationRejected(e)),
            Err(e) => Err(MeterError::transport("KPPA authorization", 1, e)),
        }
    }

    /// Write a register that needs KPPA; refused without touching the bus
    /// unless [`authorize`](Self::authorize) succeeded first.
    pub fn write_protected(&mut self, register: ConfigRegister, value: u16) -> Result<WriteOutcome> {
        if !self.authorized {
            return Err(MeterError::AuthorizationRequired(register.name().to_string()));
        }
        self.write_config(register.address(), value, register.requires_restart())
    }

    /// Write `register`, going through the KPPA gate when it needs it.
    pub fn write_register(&mut self, register: ConfigRegister, value: u16) -> Result<WriteOutcome> {
        if register.requires_authorization() {
            self.write_protected(register, value)
        } else {
            self.write_config(register.address(), value, register.requires_restart())
        }
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    fn pause_before_command(&self) {
        let delay = self.policy.inter_attempt_delay;
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "command delay");
            thread::sleep(delay);
        }
    }
}

fn decode(request: &RegisterRequest, words: Vec<u16>) -> std::result::Result<RegisterValue, TransportError> {
    for (i, word) in words.iter().enumerate() {
        debug!("reg[{}/{}]={} (0x{:X})", i, words.len().saturating_sub(1), word, word);
    }
    if words.len() != usize::from(request.count) {
        return Err(TransportError::Frame(format!(
            "expected {} registers, got {}",
            request.count,
            words.len()
        )));
    }

    let value = match request.encoding {
        Encoding::Raw16 => RegisterValue::Raw(words),
        Encoding::Float32 => RegisterValue::Float(
            decode_float(&words).ok_or_else(|| TransportError::Frame("a float needs exactly 2 registers".to_string()))?,
        ),
        Encoding::Bcd => RegisterValue::Bcd(
            bcd_to_num(&words).ok_or_else(|| TransportError::Frame("BCD value does not fit in 64 bits".to_string()))?,
        ),
        Encoding::Uint16 => RegisterValue::Uint(words[0]),
    };
    Ok(value)
}

fn unexpected(request: &RegisterRequest, value: &RegisterValue) -> MeterError {
    MeterError::transport(
        request.describe(),
        1,
        TransportError::Frame(format!("unexpected value {:?}", value)),
    )
}
