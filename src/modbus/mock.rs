//! Scripted transport for tests.

use super::transport::{RegisterTransport, TransportError};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One call made on a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    SetSlave(u8),
    SetResponseTimeout(Duration),
    SetByteTimeout(Option<Duration>),
    ReadInput { address: u16, count: u16 },
    ReadHolding { address: u16, count: u16 },
    Write { address: u16, values: Vec<u16> },
    Close,
}

impl Call {
    pub(crate) fn is_exchange(&self) -> bool {
        matches!(
            self,
            Call::ReadInput { .. } | Call::ReadHolding { .. } | Call::Write { .. }
        )
    }
}

/// Replays queued replies in order; once the script runs out every exchange
/// times out.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    replies: VecDeque<Result<Vec<u16>, TransportError>>,
    calls: Vec<(Call, Instant)>,
    closed: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A transport on which every exchange fails.
    pub(crate) fn failing() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, words: &[u16]) -> Self {
        self.replies.push_back(Ok(words.to_vec()));
        self
    }

    /// Acknowledge a write.
    pub(crate) fn ack(self) -> Self {
        self.reply(&[])
    }

    pub(crate) fn fail(mut self, error: TransportError) -> Self {
        self.replies.push_back(Err(error));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.iter().map(|(call, _)| call.clone()).collect()
    }

    /// Wire exchanges with the time each started.
    pub(crate) fn exchanges(&self) -> Vec<(Call, Instant)> {
        self.calls
            .iter()
            .filter(|(call, _)| call.is_exchange())
            .cloned()
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&mut self, call: Call) {
        self.calls.push((call, Instant::now()));
    }

    fn next_reply(&mut self) -> Result<Vec<u16>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.replies.pop_front().unwrap_or(Err(TransportError::Timeout))
    }
}

impl RegisterTransport for MockTransport {
    fn set_slave(&mut self, unit: u8) {
        self.record(Call::SetSlave(unit));
    }

    fn set_response_timeout(&mut self, timeout: Duration) {
        self.record(Call::SetResponseTimeout(timeout));
    }

    fn set_byte_timeout(&mut self, timeout: Option<Duration>) {
        self.record(Call::SetByteTimeout(timeout));
    }

    fn read_input_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.record(Call::ReadInput { address, count });
        self.next_reply()
    }

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.record(Call::ReadHolding { address, count });
        self.next_reply()
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError> {
        self.record(Call::Write {
            address,
            values: values.to_vec(),
        });
        self.next_reply().map(|_| ())
    }

    fn close(&mut self) {
        self.record(Call::Close);
        self.closed = true;
    }
}
