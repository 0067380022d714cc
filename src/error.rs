//! Error types for device sessions, the device store and batch setup.
//!
//! Per-device failures are [`DeviceError`] values: the dispatcher attaches them
//! to the device's result instead of propagating them. [`CommanderError`] is
//! reserved for caller-level problems detected before a batch starts.

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// Errors raised while talking to a single device.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The device could not be reached or the connection dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connecting to the device (or the whole session) took too long.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The device answered, but not the way the session expected.
    ///
    /// Covers a missing prompt, a mode change that did not land in the
    /// expected mode, a closed shell channel and a command that never
    /// returned to a prompt.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used when reporting a failed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    Authentication,
    Connection,
    Unclassified,
}

impl DeviceError {
    /// Returns the reporting class of this error.
    ///
    /// Timeouts are reported together with connection failures.
    pub fn kind(&self) -> DeviceErrorKind {
        match self {
            DeviceError::Authentication(_) => DeviceErrorKind::Authentication,
            DeviceError::Connection(_) | DeviceError::Timeout(_) => DeviceErrorKind::Connection,
            DeviceError::Protocol(_) | DeviceError::Other(_) => DeviceErrorKind::Unclassified,
        }
    }
}

impl From<russh::Error> for DeviceError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::NotAuthenticated | russh::Error::NoAuthMethod => {
                DeviceError::Authentication(err.to_string())
            }
            russh::Error::ConnectionTimeout
            | russh::Error::KeepaliveTimeout
            | russh::Error::InactivityTimeout => DeviceError::Timeout(err.to_string()),
            russh::Error::IO(_) | russh::Error::Disconnect | russh::Error::HUP => {
                DeviceError::Connection(err.to_string())
            }
            other => DeviceError::Other(other.to_string()),
        }
    }
}

impl From<async_ssh2_tokio::Error> for DeviceError {
    fn from(err: async_ssh2_tokio::Error) -> Self {
        match err {
            async_ssh2_tokio::Error::PasswordWrong => {
                DeviceError::Authentication("password rejected".to_string())
            }
            async_ssh2_tokio::Error::SshError(inner) => DeviceError::from(inner),
            async_ssh2_tokio::Error::AddressInvalid(inner) => {
                DeviceError::Connection(format!("invalid address: {inner}"))
            }
            async_ssh2_tokio::Error::IoError(inner) => {
                if inner.kind() == std::io::ErrorKind::TimedOut {
                    DeviceError::Timeout(inner.to_string())
                } else {
                    DeviceError::Connection(inner.to_string())
                }
            }
            other => DeviceError::Other(other.to_string()),
        }
    }
}

impl From<SendError<String>> for DeviceError {
    fn from(err: SendError<String>) -> Self {
        DeviceError::Protocol(format!("failed to send data to shell: {err}"))
    }
}

/// Errors raised by the device store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("device {0} doesn't exist")]
    NotFound(String),

    #[error("device {0} already exists")]
    AlreadyExists(String),

    #[error("invalid device name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("device {0} is already tagged with '{1}'")]
    AlreadyTagged(String, String),

    #[error("device {0} is not tagged with '{1}'")]
    NotTagged(String, String),

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store is corrupted: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller-level errors. A batch that fails with one of these never starts.
#[derive(Error, Debug)]
pub enum CommanderError {
    /// Misuse detected before dispatch: bad permission level, no devices,
    /// an output path that is not a directory, an unusable config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
