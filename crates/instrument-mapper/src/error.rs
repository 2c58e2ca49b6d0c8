//! Error types for the mapper and its collaborators
//!
//! Each collaborator reports failures through its own enum; [`MapperError`]
//! wraps them so a single iteration step can use `?` across all three.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Device Port failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Opening the device failed
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// A blocking read failed
    #[error("Failed to read from device: {0}")]
    ReadFailed(String),

    /// The device returned fewer bytes than its report length
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Report length
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// Closing the device failed
    #[error("Failed to close device: {0}")]
    CloseFailed(String),

    /// Operation requires an open device
    #[error("Device is not open")]
    NotOpen,

    /// Device went away
    #[error("Device disconnected")]
    Disconnected,

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err.to_string())
    }
}

/// Report Converter failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Input report shorter than the converter needs
    #[error("Input report too short: need {needed} bytes, got {actual}")]
    InputTooShort {
        /// Minimum length required
        needed: usize,
        /// Length supplied
        actual: usize,
    },

    /// Input report content could not be interpreted
    #[error("Malformed input report: {0}")]
    Malformed(String),
}

/// Controller Sink failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Connecting the virtual controller failed
    #[error("Failed to connect virtual controller: {0}")]
    ConnectFailed(String),

    /// Forwarding a report failed
    #[error("Failed to send report: {0}")]
    SendFailed(String),

    /// Disconnecting the virtual controller failed
    #[error("Failed to disconnect virtual controller: {0}")]
    DisconnectFailed(String),

    /// Operation requires a connected controller
    #[error("Virtual controller is not connected")]
    NotConnected,
}

/// Diagnostic Sink failures.
#[derive(Debug, Clone, Error)]
pub enum DiagnosticError {
    /// Record directory could not be created
    #[error("Failed to create diagnostic directory {}: {message}", .path.display())]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// I/O error text
        message: String,
    },

    /// Record could not be written
    #[error("Failed to write diagnostic record {}: {message}", .path.display())]
    Write {
        /// Record path
        path: PathBuf,
        /// I/O error text
        message: String,
    },

    /// Every candidate record name for this timestamp is taken
    #[error("No free diagnostic record name for {0}")]
    NamesExhausted(String),

    /// Sink refused the record
    #[error("Diagnostic sink rejected record: {0}")]
    Rejected(String),
}

impl DiagnosticError {
    /// Create a directory creation error.
    #[must_use]
    pub fn create_dir(path: &Path, err: &std::io::Error) -> Self {
        Self::CreateDir {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Create a record write error.
    #[must_use]
    pub fn write(path: &Path, err: &std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Result type for diagnostic operations
pub type DiagnosticResult<T> = Result<T, DiagnosticError>;

/// Errors surfaced by the mapper loop.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Device Port failure
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Report Converter failure
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Controller Sink failure
    #[error("Controller sink error: {0}")]
    Sink(#[from] SinkError),

    /// Diagnostic Sink failure
    #[error("Diagnostic error: {0}")]
    Diagnostic(#[from] DiagnosticError),

    /// Device reported an unusable input report length
    #[error("Invalid input report length: {0}")]
    InvalidReadLength(usize),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Worker thread could not be started
    #[error("Failed to spawn mapper thread: {0}")]
    Spawn(String),

    /// A device, converter or sink call panicked inside the loop
    #[error("Iteration step panicked: {0}")]
    StepPanicked(String),

    /// Worker thread panicked outside the loop; its device and sink were lost
    #[error("Mapper thread panicked")]
    WorkerPanicked,

    /// Device and sink are not available to this instance anymore
    #[error("Device and controller sink are unavailable")]
    ResourcesUnavailable,
}

impl MapperError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a spawn error.
    #[must_use]
    pub fn spawn(reason: impl Into<String>) -> Self {
        Self::Spawn(reason.into())
    }

    /// Create a step panic error from a caught panic payload.
    #[must_use]
    pub fn step_panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        Self::StepPanicked(panic_message(payload))
    }
}

/// Text of a panic payload, for the common `&str` and `String` cases.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result type for mapper operations
pub type MapperResult<T> = Result<T, MapperError>;
