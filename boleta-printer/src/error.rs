//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Host or device unreachable
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No matching hardware found, or the device is held by someone else
    #[error("Device busy or absent: {0}")]
    DeviceNotFound(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Text or image that cannot be turned into printer bytes
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid or missing printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// libusb failure
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Serial port failure
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// OS print spooler failure
    #[error("Spooler error: {0}")]
    Spooler(String),

    /// Print agent rejected the job or broke the channel
    #[error("Agent error: {0}")]
    Agent(String),
}

impl PrintError {
    /// Configuration problems are detected before any I/O happens
    pub fn is_config(&self) -> bool {
        matches!(self, PrintError::InvalidConfig(_))
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
