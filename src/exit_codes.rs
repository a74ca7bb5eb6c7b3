//! Exit code constants for the tac1100 CLI.
//!
//! - 0: Success
//! - 1: Usage error (bad args, invalid combination of options)
//! - 2: Serial port lock could not be acquired
//! - 3: Bus transport failure after all retries
//! - 4: KPPA authorization rejected or missing
//! - 5: Lock file or other OS resource failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Usage error: bad arguments or mutually exclusive options.
pub const USAGE_ERROR: i32 = 1;

/// Lock acquisition failure: another process kept the serial port.
pub const LOCK_FAILURE: i32 = 2;

/// Transport failure: the meter did not answer within the retry budget.
pub const TRANSPORT_FAILURE: i32 = 3;

/// Authorization failure: the meter refused the KPPA password, or a protected
/// write was attempted without one.
pub const AUTHORIZATION_FAILURE: i32 = 4;

/// Resource failure: the lock directory or lock file could not be used.
pub const RESOURCE_FAILURE: i32 = 5;
