//! Error types for t5flash.

use std::io;
use thiserror::Error;

/// Result type for t5flash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for t5flash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port stream).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The port rejected a DTR/RTS change.
    #[error("Signal change rejected: {0}")]
    SignalFailed(String),

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The operation was stopped by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Device not responding or no port available.
    #[error("Device not found or not in download mode")]
    DeviceNotFound,

    /// Unsupported platform or operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
