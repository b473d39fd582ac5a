//! Error types for mijia-core.
//!
//! The sensor helpers are separate processes, so most failures arrive as an
//! exit status rather than an in-process error. [`HelperStatus`] maps those
//! statuses; [`Error`] carries them to the retry logic, which treats
//! timeouts as retryable, disconnects as attempt-forfeiting, cancellation
//! as a clean stop, and anything unclassified as fatal for the cycle.

use std::time::Duration;

use thiserror::Error;

/// Result type for mijia-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit statuses the sensor helper processes use to report their outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperStatus {
    /// Operation completed; result is on stdout.
    Ok,
    /// The helper was invoked with bad arguments.
    InvalidArgs,
    /// The user interrupted the helper.
    UserCancelled,
    /// The device did not send data in time.
    TimedOut,
    /// The device link dropped or could not be established.
    Disconnected,
    /// Any other failure.
    UnknownError,
}

impl HelperStatus {
    /// Map a raw process exit code onto a status.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::InvalidArgs,
            2 => Self::UserCancelled,
            3 => Self::TimedOut,
            4 => Self::Disconnected,
            _ => Self::UnknownError,
        }
    }
}

/// Errors that can occur when talking to sensors through the helpers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The external operation exceeded its time budget.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// The helper reported the device unreachable or the link dropped.
    #[error("device {address} disconnected or unreachable")]
    Disconnected { address: String },

    /// The helper was interrupted by the user.
    #[error("operation cancelled by user")]
    Cancelled,

    /// The helper rejected its arguments. Indicates a bug in how the helper
    /// was invoked, not a hardware condition.
    #[error("helper rejected arguments: {0}")]
    InvalidArgs(String),

    /// The helper exited with an unclassified status.
    #[error("helper {operation} failed (exit code {code:?})")]
    Helper {
        operation: &'static str,
        code: Option<i32>,
    },

    /// The helper produced output that could not be decoded.
    #[error("invalid helper output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    /// Failed to spawn or wait on a helper process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
