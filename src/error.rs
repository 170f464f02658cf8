//! Error types shared across the bridge
//!
//! Three layers, innermost first:
//! - [`ProtocolError`]: malformed or unexpected wire data
//! - [`HostError`]: anything that goes wrong talking to the host compositor
//! - [`BridgeError`]: bootstrap and surface-management failures surfaced to
//!   the embedding server, each mapping onto an [`InitStatus`]

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{Interface, ObjectId};

/// Malformed wire data received from (or about to be sent to) the host.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message size {0} is smaller than the header")]
    InvalidSize(usize),

    #[error("message of {0} bytes does not fit the 16-bit size field")]
    MessageTooLarge(usize),

    #[error("message truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("string argument is not NUL terminated")]
    UnterminatedString,

    #[error("string argument is not valid UTF-8")]
    InvalidUtf8,

    #[error("array length {0} is not a multiple of 4")]
    MisalignedArray(usize),

    #[error("unknown opcode {opcode} for interface {interface}")]
    UnknownOpcode { interface: Interface, opcode: u16 },

    #[error("arguments of {interface} event {opcode} do not match its signature")]
    ArgumentMismatch { interface: Interface, opcode: u16 },

    #[error("{0} trailing bytes after the last argument")]
    TrailingBytes(usize),

    #[error("file descriptor arguments are not supported on the host connection")]
    UnexpectedFd,
}

/// Failures of the host compositor connection.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host connection I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("host compositor closed the connection")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("host reported error {code} on object {object}: {message}")]
    HostReported {
        object: ObjectId,
        code: u32,
        message: String,
    },
}

/// Status handed back to the embedding server by `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Success,
    /// The connection could not be created or broke down during bootstrap.
    BadAlloc,
    /// The GPU device could not be opened or authenticated.
    BadAccess,
}

impl InitStatus {
    pub fn from_result<T>(result: &Result<T, BridgeError>) -> Self {
        match result {
            Ok(_) => InitStatus::Success,
            Err(e) => e.status(),
        }
    }
}

/// Bootstrap and surface-management failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to connect to host compositor socket {socket}: {source}")]
    Connect {
        socket: String,
        #[source]
        source: io::Error,
    },

    #[error("host failed during bootstrap: {0}")]
    Host(#[from] HostError),

    #[error("host did not advertise a GPU device node")]
    NoDevice,

    #[error("failed to open GPU device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to get GPU device magic: {0}")]
    DeviceMagic(#[source] io::Error),

    #[error("host did not confirm device authentication within {0:?}")]
    AuthTimeout(Duration),

    #[error("event loop registration failed: {0}")]
    EventLoop(String),

    #[error("host has not advertised a compositor global")]
    NoCompositor,

    #[error("window {0} already has a host surface")]
    SurfaceExists(u32),

    #[error("window {0} has no host surface")]
    UnknownWindow(u32),
}

impl BridgeError {
    /// Collapse the error onto the three-valued status the embedding server expects.
    pub fn status(&self) -> InitStatus {
        match self {
            BridgeError::Connect { .. } | BridgeError::Host(_) | BridgeError::EventLoop(_) => {
                InitStatus::BadAlloc
            }
            BridgeError::NoDevice
            | BridgeError::DeviceOpen { .. }
            | BridgeError::DeviceMagic(_)
            | BridgeError::AuthTimeout(_) => InitStatus::BadAccess,
            BridgeError::NoCompositor
            | BridgeError::SurfaceExists(_)
            | BridgeError::UnknownWindow(_) => InitStatus::BadAlloc,
        }
    }
}
