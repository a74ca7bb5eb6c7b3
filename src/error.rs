//! Error types for the tac1100 CLI.
//!
//! Uses thiserror for derive macros. Every variant maps to one of the exit
//! codes in [`crate::exit_codes`].

use crate::exit_codes;
use crate::locks::LockError;
use crate::modbus::TransportError;
use thiserror::Error;

/// Main error type for tac1100 operations.
#[derive(Error, Debug)]
pub enum MeterError {
    /// Invalid arguments, invalid option combination, or a bad config file.
    #[error("{0}")]
    Usage(String),

    /// The serial port lock could not be taken or the lock file is unusable.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The bus did not deliver a valid answer within the retry budget.
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Transport {
        operation: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The meter refused the KPPA password.
    #[error("KPPA authorization rejected by the meter: {0}")]
    AuthorizationRejected(TransportError),

    /// A protected register was written without a prior successful KPPA step.
    #[error("writing {0} requires KPPA authorization (use -Q with the current password)")]
    AuthorizationRequired(String),
}

impl MeterError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MeterError::Usage(_) => exit_codes::USAGE_ERROR,
            MeterError::Lock(e) => e.exit_code(),
            MeterError::Transport { .. } => exit_codes::TRANSPORT_FAILURE,
            MeterError::AuthorizationRejected(_) | MeterError::AuthorizationRequired(_) => {
                exit_codes::AUTHORIZATION_FAILURE
            }
        }
    }

    pub(crate) fn transport(operation: impl Into<String>, attempts: u32, source: TransportError) -> Self {
        MeterError::Transport {
            operation: operation.into(),
            attempts,
            source,
        }
    }
}

/// Result type alias for tac1100 operations.
pub type Result<T> = std::result::Result<T, MeterError>;
