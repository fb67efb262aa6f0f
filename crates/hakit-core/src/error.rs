//! Error types shared by the bridge and the sensor adapters.
//!
//! Variants are grouped by how the bridge reacts to them:
//!
//! - construction errors abort driver creation before any worker exists,
//! - transient errors only ever surface inside the poll worker, where they
//!   become an invalid [`Response`](crate::Response),
//! - operational errors are returned to the event loop at the call site.

use std::fmt;

use thiserror::Error;

/// Which of the two bridge queues an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Event loop to worker.
    Request,
    /// Worker to event loop.
    Response,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Request => write!(f, "request"),
            QueueKind::Response => write!(f, "response"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Construction errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid channel {channel}: {reason}")]
    InvalidChannel { channel: String, reason: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Cannot spawn poll worker: {0}")]
    Spawn(#[source] std::io::Error),

    // Transient device errors
    #[error("Bus transfer failed: {0}")]
    Transfer(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Device not ready: {0}")]
    NotReady(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // Operational errors
    #[error("The {queue} queue is full ({capacity} messages)")]
    QueueFull { queue: QueueKind, capacity: usize },

    #[error("Poll worker terminated")]
    WorkerTerminated,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new invalid channel error.
    pub fn invalid_channel(channel: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidChannel {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new device-not-found error.
    pub fn device_not_found(device: impl Into<String>) -> Self {
        Self::DeviceNotFound(device.into())
    }

    /// Create a new initialization error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed(message.into())
    }

    /// Create a new bus transfer error.
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer(message.into())
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Create a new not-ready error.
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Returns `true` for errors that abort driver construction.
    #[must_use]
    pub fn is_construction_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. }
                | Error::InvalidChannel { .. }
                | Error::DeviceNotFound(_)
                | Error::InitializationFailed(_)
                | Error::Spawn(_)
        )
    }

    /// Returns `true` for single-read failures the worker survives.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Transfer(_)
                | Error::InvalidData(_)
                | Error::NotReady(_)
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
