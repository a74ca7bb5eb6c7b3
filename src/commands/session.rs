//! One bus session: lock, connect, talk, close, unlock.

use crate::error::Result;
use crate::locks::{Claim, LockCoordinator};
use crate::meter::{RegisterClient, RetryPolicy};
use crate::modbus::RegisterTransport;
use crate::process::ProcessTable;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How to reach the meter once the bus is ours.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Slave address.
    pub unit: u8,
    pub policy: RetryPolicy,
    /// Pause between opening the line and the first frame.
    pub settle_time: Duration,
}

/// Run `work` while holding the serial port exclusively.
///
/// The transport is only opened after the bus lock is held. Whatever
/// happens, the transport is closed and the lock released before returning;
/// an error from `work` wins over an error from releasing.
pub fn run_on_bus<P, T, R>(
    coordinator: &mut LockCoordinator<P>,
    settings: SessionSettings,
    connect: impl FnOnce() -> Result<T>,
    work: impl FnOnce(&mut RegisterClient<T>) -> Result<R>,
) -> Result<R>
where
    P: ProcessTable,
    T: RegisterTransport,
{
    let started = Instant::now();
    let outcome = hold_bus(coordinator, settings, connect, work);
    let released = coordinator.release();
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "bus session finished");

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_error)) => {
            warn!(error = %release_error, "failed to release serial port lock");
            Err(e)
        }
    }
}

fn hold_bus<P, T, R>(
    coordinator: &mut LockCoordinator<P>,
    settings: SessionSettings,
    connect: impl FnOnce() -> Result<T>,
    work: impl FnOnce(&mut RegisterClient<T>) -> Result<R>,
) -> Result<R>
where
    P: ProcessTable,
    T: RegisterTransport,
{
    match coordinator.acquire_exclusive()? {
        Claim::Owned => debug!(path = %coordinator.paths().record.display(), "serial port locked"),
        Claim::SharedWithPeer(record) => {
            info!(holder = %record, "serial port shared with a compatible client")
        }
    }

    let transport = connect()?;
    if !settings.settle_time.is_zero() {
        debug!(settle_ms = settings.settle_time.as_millis() as u64, "waiting for the line to settle");
        thread::sleep(settings.settle_time);
    }

    let mut client = RegisterClient::new(transport, settings.unit, settings.policy);
    let result = work(&mut client);
    client.close();
    result
}
