use std::io;

use thiserror::Error;

use crate::tftp::session::SessionState;
use crate::tftp::shared::err_packet::TFTPError;
use crate::tftp::shared::TFTPParseError;

/// Everything that can end a transfer early.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Unable to resolve host [{host}]: {reason}")]
    HostResolution { host: String, reason: String },
    #[error("Session is {actual:?}, operation needs {expected:?}")]
    SessionState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error("No response from remote host after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("TFTP error {}: {}", .code.code(), .message)]
    Server { code: TFTPError, message: String },
    #[error("{0} not supported")]
    Unsupported(&'static str),
    #[error("Stream closed")]
    Closed,
    /// An earlier failure ended the transfer; carries its description.
    #[error("Transfer aborted: {0}")]
    Aborted(String),
    #[error("Block of {0} bytes exceeds the 512 byte stride")]
    BlockTooLarge(usize),
    #[error("Network error: {0}")]
    Io(#[from] io::Error),
}

impl From<TFTPParseError> for TransferError {
    fn from(err: TFTPParseError) -> Self {
        TransferError::Protocol(err.details().to_string())
    }
}

impl From<TransferError> for io::Error {
    fn from(err: TransferError) -> Self {
        let kind = match &err {
            TransferError::Io(e) => e.kind(),
            TransferError::HostResolution { .. } => io::ErrorKind::NotFound,
            TransferError::Timeout { .. } => io::ErrorKind::TimedOut,
            TransferError::Protocol(_) => io::ErrorKind::InvalidData,
            TransferError::Unsupported(_) => io::ErrorKind::Unsupported,
            TransferError::Closed => io::ErrorKind::BrokenPipe,
            TransferError::Aborted(_) => io::ErrorKind::ConnectionAborted,
            TransferError::BlockTooLarge(_) => io::ErrorKind::InvalidInput,
            TransferError::SessionState { .. } | TransferError::Server { .. } => {
                io::ErrorKind::Other
            }
        };

        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
