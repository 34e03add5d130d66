//! GSM driver error types.

use crate::at::ResponseStatus;
use thiserror::Error;

/// Errors that can occur while talking to the modem.
#[derive(Error, Debug)]
pub enum GsmError {
    /// Serial port could not be opened or configured.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// IO error on the serial line.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport refused bytes for longer than the write window.
    #[error("Write stalled after {written} of {total} bytes")]
    WriteStall { written: usize, total: usize },

    /// No complete answer arrived in time.
    #[error("Timeout waiting for {0:?}")]
    Timeout(ResponseStatus),

    /// The answer resolved to a different category.
    #[error("Expected {expected:?}, modem answered {actual:?}")]
    UnexpectedStatus {
        expected: ResponseStatus,
        actual: ResponseStatus,
    },

    /// The answer completed but lacked the requested field.
    #[error("Missing field in {0} answer")]
    MissingField(&'static str),

    /// The modem answered, but with a value the caller cannot accept.
    #[error("Rejected by modem: {0}")]
    Rejected(String),

    /// Caller passed an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Shutdown requested while waiting on the modem.
    #[error("Cancelled")]
    Cancelled,
}

/// Result type for GSM driver operations.
pub type Result<T> = std::result::Result<T, GsmError>;
