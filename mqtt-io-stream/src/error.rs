//! Error types for mqtt-io-stream.
//!
//! Each stream operation has its own error enum so callers can match on
//! exactly the failures that operation can produce. [`TransportError`]
//! normalizes whatever the underlying USB or HID library reports, and
//! [`Error`] collects everything for code that just wants to bail out.

use thiserror::Error;

use crate::stream::{SetupStep, StreamState};
use crate::transport::Direction;
use crate::types::DeviceIdentity;

/// Failure reported by a USB or HID transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,

    #[error("device has been disconnected")]
    NoDevice,

    #[error("entity not found")]
    NotFound,

    #[error("resource busy")]
    Busy,

    #[error("endpoint halted")]
    Pipe,

    #[error("transfer overflow")]
    Overflow,

    #[error("operation not supported on this platform")]
    NotSupported,

    #[error("insufficient permissions")]
    Access,

    #[error("system call interrupted")]
    Interrupted,

    /// The transport accepted fewer bytes than a full frame.
    #[error("short transfer: {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "usb")]
impl From<rusb::Error> for TransportError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Timeout => TransportError::Timeout,
            rusb::Error::NoDevice => TransportError::NoDevice,
            rusb::Error::NotFound => TransportError::NotFound,
            rusb::Error::Busy => TransportError::Busy,
            rusb::Error::Pipe => TransportError::Pipe,
            rusb::Error::Overflow => TransportError::Overflow,
            rusb::Error::NotSupported => TransportError::NotSupported,
            rusb::Error::Access => TransportError::Access,
            rusb::Error::Interrupted => TransportError::Interrupted,
            other => TransportError::Other(other.to_string()),
        }
    }
}

#[cfg(feature = "hid")]
impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        match e {
            hidapi::HidError::IncompleteSendError { sent, all } => {
                TransportError::ShortTransfer {
                    expected: all,
                    actual: sent,
                }
            }
            other => TransportError::Other(other.to_string()),
        }
    }
}

/// Invalid stream configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("vendor id must be non-zero")]
    ZeroVendorId,

    #[error("product id must be non-zero")]
    ZeroProductId,

    #[error("read_size must be greater than zero")]
    ZeroReadSize,

    #[error("write_size must be greater than zero")]
    ZeroWriteSize,
}

/// Why a stream could not be opened.
///
/// Setup failures are fatal: the stream stays unopened and holds no
/// device handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("device {identity} not found")]
    DeviceNotFound { identity: DeviceIdentity },

    #[error("interface {interface} not found in active configuration")]
    InterfaceNotFound { interface: u8 },

    #[error("no {direction} endpoint on interface {interface}")]
    EndpointNotFound { interface: u8, direction: Direction },

    #[error("{step} failed: {source}")]
    Step {
        step: SetupStep,
        #[source]
        source: TransportError,
    },

    #[error("setup called on {state} stream")]
    InvalidState { state: StreamState },
}

/// Why a payload was not (fully) delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Frames before `frame` were already handed to the device.
    #[error("write failed on frame {} of {frames}: {source}", .frame + 1)]
    WriteFailed {
        frame: usize,
        frames: usize,
        #[source]
        source: TransportError,
    },

    #[error("write called on {state} stream")]
    InvalidState { state: StreamState },
}

/// Failure while releasing a stream's device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    #[error("failed to release interface {interface}: {source}")]
    ReleaseFailed {
        interface: u8,
        #[source]
        source: TransportError,
    },

    #[error("cleanup called on {state} stream")]
    InvalidState { state: StreamState },
}

/// Main error type for mqtt-io-stream operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// The requested stream module was compiled out.
    #[error("stream module `{0}` is not enabled in this build")]
    Unsupported(&'static str),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
