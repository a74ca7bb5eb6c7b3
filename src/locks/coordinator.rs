//! The serial port lock state machine.
//!
//! ```text
//! Unpublished -> Acquiring -> SharedHeld -> ExclusiveHeld -> Released
//!                    |  ^           |
//!                    |  +-----------+  (record replaced during upgrade)
//!                    +--> Released     (timeout, attempt bound)
//! ```

use super::guard::BusLock;
use super::operations::{self, ClearOutcome, Observation};
use super::policy::{Debounce, StaleHolderPolicy, Verdict, DEFAULT_COMPATIBLE_CLIENTS};
use super::record::LockRecord;
use super::types::{Claim, LockPaths, LockState};
use super::LockError;
use crate::process::{self, ProcFs, ProcessTable};
use crate::retry::{Backoff, Jitter};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default directory holding serial port lock records.
pub const DEFAULT_LOCK_DIR: &str = "/var/lock";

/// Default lock record name prefix.
pub const DEFAULT_LOCK_PREFIX: &str = "LCK..";

/// Tuning for [`LockCoordinator`].
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Directory holding the lock record.
    pub lock_dir: PathBuf,

    /// Prefix prepended to the device base name.
    pub lock_prefix: String,

    /// How long to wait for another holder before giving up.
    pub wait: Duration,

    /// Hard bound on polls, whatever the wait.
    pub max_attempts: u32,

    /// Base delay between polls.
    pub poll_interval: Duration,

    /// Polls sleep `poll_interval` times a random factor in `1..=poll_jitter`.
    pub poll_jitter: u32,

    /// Consecutive polls an anomaly must be seen on before acting on it.
    pub stale_confirmations: u32,

    /// Command-line tokens of Modbus clients that may share the bus.
    pub compatible_clients: Vec<String>,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
            wait: Duration::ZERO,
            max_attempts: 100,
            poll_interval: Duration::from_millis(25),
            poll_jitter: 10,
            stale_confirmations: 2,
            compatible_clients: DEFAULT_COMPATIBLE_CLIENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Who this process claims to be in lock records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub pid: u32,
    pub command: String,
}

impl Identity {
    /// The running process, as seen through `table`.
    pub fn current(table: &impl ProcessTable) -> Self {
        let command_line = process::current_command_line(table);
        Self {
            pid: process::current_pid(),
            command: process::program_name(&command_line).to_string(),
        }
    }
}

/// Coordinates access to one serial device with other processes.
///
/// Dropping the coordinator releases whatever it still holds.
pub struct LockCoordinator<P: ProcessTable = ProcFs> {
    paths: LockPaths,
    identity: Identity,
    table: P,
    policy: StaleHolderPolicy,
    settings: LockSettings,
    state: LockState,
    bus: Option<BusLock>,
}

impl LockCoordinator<ProcFs> {
    /// Coordinator for `device` acting as the current process.
    pub fn for_device(device: &str, settings: LockSettings) -> Result<Self, LockError> {
        let table = ProcFs::new();
        let identity = Identity::current(&table);
        Self::with_identity(device, settings, table, identity)
    }
}

impl<P: ProcessTable> LockCoordinator<P> {
    /// Coordinator for `device` acting as `identity`, judging other holders
    /// through `table`.
    pub fn with_identity(
        device: &str,
        settings: LockSettings,
        table: P,
        identity: Identity,
    ) -> Result<Self, LockError> {
        let paths = LockPaths::for_device(device, &settings.lock_dir, &settings.lock_prefix, identity.pid)?;
        let policy = StaleHolderPolicy::new(settings.compatible_clients.iter().cloned());

        Ok(Self {
            paths,
            identity,
            table,
            policy,
            settings,
            state: LockState::Unpublished,
            bus: None,
        })
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn paths(&self) -> &LockPaths {
        &self.paths
    }

    /// Publish our record and poll until it names us or a compatible peer.
    ///
    /// On failure nothing this process wrote is left behind.
    pub fn acquire(&mut self) -> Result<Claim, LockError> {
        match self.state {
            LockState::Unpublished => {}
            other => return Err(LockError::NotHeld(other)),
        }

        self.state = LockState::Acquiring;
        let claimed = self.publish().and_then(|_| self.wait_for_claim());
        match claimed {
            Ok(claim) => {
                self.state = LockState::SharedHeld;
                Ok(claim)
            }
            Err(e) => {
                self.abandon();
                Err(e)
            }
        }
    }

    /// Take the exclusive bus lock.
    ///
    /// If the record is replaced while waiting for the lock, the record is
    /// claimed again before retrying.
    pub fn lock_bus(&mut self) -> Result<(), LockError> {
        match self.state {
            LockState::SharedHeld => {}
            LockState::ExclusiveHeld => return Ok(()),
            other => return Err(LockError::NotHeld(other)),
        }

        match self.upgrade() {
            Ok(bus) => {
                self.bus = Some(bus);
                self.state = LockState::ExclusiveHeld;
                Ok(())
            }
            Err(e) => {
                self.abandon();
                Err(e)
            }
        }
    }

    /// [`acquire`](Self::acquire) followed by [`lock_bus`](Self::lock_bus).
    pub fn acquire_exclusive(&mut self) -> Result<Claim, LockError> {
        let claim = self.acquire()?;
        self.lock_bus()?;
        Ok(claim)
    }

    /// Let go of the bus lock and remove our record if it still names us.
    ///
    /// Idempotent. A record that now names another process is left alone.
    pub fn release(&mut self) -> Result<(), LockError> {
        let previous = std::mem::replace(&mut self.state, LockState::Released);
        if let Some(bus) = self.bus.take() {
            bus.release();
        }

        match previous {
            LockState::Released | LockState::Unpublished => return Ok(()),
            _ => {}
        }

        match operations::clear_if_held_by(&self.paths, self.identity.pid)? {
            ClearOutcome::Cleared => debug!(path = %self.paths.record.display(), "lock record removed"),
            ClearOutcome::Missing => debug!("lock record already gone"),
            ClearOutcome::HeldBy(pid) => debug!(holder = pid, "lock record belongs to another process, left in place"),
            ClearOutcome::Unrecognized => debug!("lock record unreadable, left in place"),
        }
        Ok(())
    }

    fn publish(&self) -> Result<(), LockError> {
        let record = LockRecord::new(self.identity.pid, self.identity.command.clone());
        operations::publish(&self.paths, &record, self.settings.poll_interval)?;
        Ok(())
    }

    /// Best-effort cleanup after a failure; the original error is what the
    /// caller reports.
    fn abandon(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to clean up lock record");
        }
    }

    fn wait_for_claim(&mut self) -> Result<Claim, LockError> {
        let started = Instant::now();
        let mut polls = Backoff::new(self.settings.max_attempts, self.settings.poll_interval)
            .with_jitter(Jitter::Scale(self.settings.poll_jitter));
        let mut stale = Debounce::new(self.settings.stale_confirmations);
        let mut corrupt = Debounce::new(self.settings.stale_confirmations);
        let mut grace_polls = 0;

        while let Some(attempt) = polls.next_attempt() {
            let mut holder = None;
            match operations::read_shared(&self.paths)? {
                Observation::Missing => {
                    debug!(attempt, "lock record vanished, publishing again");
                    stale.reset();
                    corrupt.reset();
                    self.publish()?;
                    continue;
                }
                Observation::Corrupt(reason) => {
                    stale.reset();
                    if corrupt.observe(0) {
                        warn!(path = %self.paths.record.display(), %reason, "replacing corrupt lock record");
                        self.replace_corrupt()?;
                        corrupt.reset();
                        continue;
                    }
                    debug!(attempt, %reason, "lock record unreadable");
                }
                Observation::Record(record) => {
                    corrupt.reset();
                    holder = Some(record.holder_pid);
                    if record.names(self.identity.pid) {
                        debug!(attempt, "lock record names this process");
                        return Ok(Claim::Owned);
                    }

                    let live = self.table.command_line_of(record.holder_pid);
                    match self.policy.assess(&record, live.as_deref()) {
                        Verdict::CompatiblePeer => {
                            info!(holder = %record, "sharing serial port with compatible client");
                            return Ok(Claim::SharedWithPeer(record));
                        }
                        Verdict::Valid => {
                            stale.reset();
                            debug!(attempt, holder = %record, "serial port locked by another process");
                        }
                        Verdict::Stale(reason) => {
                            if !stale.observe(record.holder_pid) {
                                debug!(attempt, holder = %record, %reason, "lock holder looks stale");
                            } else {
                                stale.reset();
                                if self.still_stale(&record) {
                                    warn!(holder = %record, %reason, "clearing stale lock record");
                                    operations::clear_if_held_by(&self.paths, record.holder_pid)?;
                                    self.publish()?;
                                    continue;
                                }
                                debug!(attempt, holder = %record, "lock holder came back, waiting");
                            }
                        }
                    }
                }
            }

            if started.elapsed() >= self.settings.wait {
                let confirming = stale.is_pending() || corrupt.is_pending();
                if !confirming || grace_polls >= self.settings.stale_confirmations {
                    return Err(LockError::Timeout {
                        device: self.paths.device.clone(),
                        waited: self.settings.wait,
                        holder,
                    });
                }
                grace_polls += 1;
            }
            polls.pause();
        }

        Err(LockError::TooManyAttempts {
            path: self.paths.record.clone(),
            attempts: polls.attempt(),
        })
    }

    fn upgrade(&mut self) -> Result<BusLock, LockError> {
        let mut rounds = Backoff::new(self.settings.max_attempts, Duration::ZERO);
        while rounds.next_attempt().is_some() {
            debug!(path = %self.paths.record.display(), "upgrading to exclusive lock");
            if let Some(bus) = BusLock::acquire(&self.paths.record)?
                && bus.is_current()?
            {
                return Ok(bus);
            }

            debug!("lock record replaced during upgrade, claiming it again");
            self.state = LockState::Acquiring;
            self.publish()?;
            self.wait_for_claim()?;
            self.state = LockState::SharedHeld;
        }

        Err(LockError::TooManyAttempts {
            path: self.paths.record.clone(),
            attempts: rounds.attempt(),
        })
    }

    /// Look the holder up once more right before its record is removed.
    fn still_stale(&self, record: &LockRecord) -> bool {
        let live = self.table.command_line_of(record.holder_pid);
        matches!(self.policy.assess(record, live.as_deref()), Verdict::Stale(_))
    }

    /// Remove a record that stayed unparseable, then publish ours.
    fn replace_corrupt(&self) -> Result<(), LockError> {
        if operations::remove_if_corrupt(&self.paths)? {
            debug!(path = %self.paths.record.display(), "corrupt lock record removed");
        }
        self.publish()
    }
}

impl<P: ProcessTable> Drop for LockCoordinator<P> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release serial port lock");
        }
    }
}

impl<P: ProcessTable> std::fmt::Debug for LockCoordinator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("paths", &self.paths)
            .field("identity", &self.identity)
            .field("state", &self.state)
            .finish()
    }
}
