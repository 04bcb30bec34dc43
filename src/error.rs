//! # Error Types
//!
//! Custom error types for HoTT Link using `thiserror`.
//!
//! Note the protocol itself has no error type: timing desyncs, unknown
//! addresses and absent data sources are all recovered silently by
//! resynchronization (the receiver simply re-polls). These errors cover
//! the surrounding plumbing — ports, files, configuration.

use thiserror::Error;

/// Main error type for HoTT Link
#[derive(Debug, Error)]
pub enum HottLinkError {
    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No usable serial device
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for HoTT Link
pub type Result<T> = std::result::Result<T, HottLinkError>;
