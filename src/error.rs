//! Error types and handling.

use crate::commanders::RegistryError;
use crate::config::ConfigError;
use crate::gsm::GsmError;
use crate::storage::StorageError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal serial port could not be opened
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Modem communication failed
    #[error("GSM error: {0}")]
    Gsm(#[from] GsmError),

    /// Commander store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Commander list rejected a change
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A background task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a task error with message
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::config(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: AppError = ConfigError::Validation("Modem port cannot be empty".to_string()).into();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Config error: Validation failed: Modem port cannot be empty"
        );
    }

    #[tokio::test]
    async fn test_join_error_becomes_task_error() {
        let handle = tokio::spawn(async {
            if true {
                panic!("boom");
            }
            1u8
        });
        let err: AppError = handle.await.unwrap_err().into();
        assert!(matches!(err, AppError::Task(_)));
    }
}
