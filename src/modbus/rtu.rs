//! Modbus RTU over a serial port.

use super::settings::SerialSettings;
use super::transport::{RegisterTransport, TransportError};
use rmodbus::client::ModbusRequest;
use rmodbus::{ErrorKind, ModbusProto, guess_response_frame_len};
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, trace};

/// Default time to wait for the first byte of a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);

// Slave address, function code and byte count (or exception code).
const FRAME_HEADER_LEN: usize = 3;

const MAX_FRAME_LEN: usize = 256;

/// A connected RTU line.
pub struct RtuTransport {
    port: Option<Box<dyn SerialPort>>,
    device: String,
    unit: u8,
    response_timeout: Duration,
    byte_timeout: Option<Duration>,
}

impl RtuTransport {
    /// Open the serial line described by `settings`.
    pub fn connect(settings: &SerialSettings) -> Result<Self, TransportError> {
        let port = serialport::new(settings.device.as_str(), settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_RESPONSE_TIMEOUT)
            .open()?;
        debug!(line = %settings, "serial port open");

        Ok(Self {
            port: Some(port),
            device: settings.device.clone(),
            unit: 1,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            byte_timeout: None,
        })
    }

    fn request(&self) -> ModbusRequest {
        ModbusRequest::new(self.unit, ModbusProto::Rtu)
    }

    /// Send `request` and read back one complete response frame.
    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response_timeout = self.response_timeout;
        let byte_timeout = self.byte_timeout;
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;

        port.clear(ClearBuffer::Input)?;
        trace!(frame = %hex(request), "tx");
        port.write_all(request)?;
        port.flush()?;

        let response = read_frame(port.as_mut(), response_timeout, byte_timeout)?;
        trace!(frame = %hex(&response), "rx");
        Ok(response)
    }

    fn read_registers(&mut self, holding: bool, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let mut request = self.request();
        let mut frame = Vec::new();
        let generated = if holding {
            request.generate_get_holdings(address, count, &mut frame)
        } else {
            request.generate_get_inputs(address, count, &mut frame)
        };
        generated.map_err(frame_error)?;

        let response = self.transact(&frame)?;
        parse_registers(&request, &response, count)
    }
}

impl RegisterTransport for RtuTransport {
    fn set_slave(&mut self, unit: u8) {
        self.unit = unit;
    }

    fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    fn set_byte_timeout(&mut self, timeout: Option<Duration>) {
        self.byte_timeout = timeout;
    }

    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.read_registers(false, address, count)
    }

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.read_registers(true, address, count)
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError> {
        let mut request = self.request();
        let mut frame = Vec::new();
        request
            .generate_set_holdings_bulk(address, values, &mut frame)
            .map_err(frame_error)?;

        let response = self.transact(&frame)?;
        request.parse_ok(&response).map_err(|e| response_error(e, &response))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(device = %self.device, "serial port closed");
        }
    }
}

impl Drop for RtuTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read one RTU frame: the header first, then as many bytes as the header
/// announces.
///
/// The response timeout applies to the first byte; once bytes flow, the byte
/// timeout (if set) bounds each gap.
fn read_frame(
    port: &mut dyn SerialPort,
    response_timeout: Duration,
    byte_timeout: Option<Duration>,
) -> Result<Vec<u8>, TransportError> {
    port.set_timeout(response_timeout)?;

    let mut frame = Vec::with_capacity(MAX_FRAME_LEN);
    let mut chunk = [0u8; MAX_FRAME_LEN];
    let mut expected = FRAME_HEADER_LEN;

    while frame.len() < expected {
        let read = match port.read(&mut chunk[..expected - frame.len()]) {
            Ok(0) => return Err(TransportError::Timeout),
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(TransportError::Timeout),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::Io(e)),
        };

        let first_bytes = frame.is_empty();
        frame.extend_from_slice(&chunk[..read]);
        if first_bytes && let Some(timeout) = byte_timeout {
            port.set_timeout(timeout)?;
        }

        if expected == FRAME_HEADER_LEN && frame.len() >= FRAME_HEADER_LEN {
            expected = usize::from(guess_response_frame_len(&frame, ModbusProto::Rtu).map_err(frame_error)?);
            if expected < FRAME_HEADER_LEN || expected > MAX_FRAME_LEN {
                return Err(TransportError::Frame(format!("implausible frame length {}", expected)));
            }
        }
    }

    Ok(frame)
}

/// Decode a read response. rmodbus checks the CRC and the slave address
/// before it looks at the function code, so a damaged frame is never taken
/// for an exception reply.
fn parse_registers(request: &ModbusRequest, response: &[u8], count: u16) -> Result<Vec<u16>, TransportError> {
    let mut values = Vec::new();
    request
        .parse_u16(response, &mut values)
        .map_err(|e| response_error(e, response))?;

    if values.len() < usize::from(count) {
        return Err(TransportError::Frame(format!(
            "expected {} registers, got {}",
            count,
            values.len()
        )));
    }
    values.truncate(usize::from(count));
    Ok(values)
}

/// Map a parse failure of `response` to a transport error. rmodbus only
/// reports an exception kind once the CRC and slave address check out, so the
/// code byte can be taken from the frame as is.
fn response_error(e: ErrorKind, response: &[u8]) -> TransportError {
    match response.get(2) {
        Some(&code) if e.is_modbus_error() || e == ErrorKind::UnknownError => TransportError::Exception { code },
        _ => frame_error(e),
    }
}

fn frame_error(e: ErrorKind) -> TransportError {
    TransportError::Frame(format!("{:?}", e))
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
