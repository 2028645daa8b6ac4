//! ERROR packet can be the acknowledgment of any other type of packet.
//! The error code is an integer indicating the nature of the error.  A
//! table of values and meanings is given in the appendix.  (Note that
//! several error codes have been added to this version of this
//! document.) The error message is intended for human consumption, and
//! should be in netascii.  Like all other strings, it is terminated with
//! a zero byte.

use std::fmt;
use std::fmt::{Display, Formatter};

use byteorder::{ByteOrder, NetworkEndian};

use crate::tftp::shared::{
    check_header, Deserializable, Serializable, TFTPPacket, TFTPParseError, HEADER_LEN, OP_ERR,
    OP_LEN,
};

#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum TFTPError {
    UndefinedError = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTID = 5,
    FileExists = 6,
    NoSuchUser = 7,
}

impl TFTPError {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(TFTPError::UndefinedError),
            1 => Some(TFTPError::FileNotFound),
            2 => Some(TFTPError::AccessViolation),
            3 => Some(TFTPError::DiskFull),
            4 => Some(TFTPError::IllegalOperation),
            5 => Some(TFTPError::UnknownTID),
            6 => Some(TFTPError::FileExists),
            7 => Some(TFTPError::NoSuchUser),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Fixed text RFC 1350 attaches to each code.
    pub fn description(self) -> &'static str {
        match self {
            TFTPError::UndefinedError => "Not defined, see error message (if any).",
            TFTPError::FileNotFound => "File not found.",
            TFTPError::AccessViolation => "Access violation.",
            TFTPError::DiskFull => "Disk full or allocation exceeded.",
            TFTPError::IllegalOperation => "Illegal TFTP operation.",
            TFTPError::UnknownTID => "Unknown transfer ID.",
            TFTPError::FileExists => "File already exists.",
            TFTPError::NoSuchUser => "No such user.",
        }
    }
}

impl Display for TFTPError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct ErrorPacket {
    code: TFTPError,
    err: String,
}

impl ErrorPacket {
    pub fn new(err: TFTPError) -> Self {
        ErrorPacket {
            code: err,
            err: err.description().to_string(),
        }
    }

    pub fn new_custom(code: TFTPError, msg: &str) -> Self {
        ErrorPacket {
            code,
            err: msg.to_string(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code.code()
    }

    pub fn kind(&self) -> TFTPError {
        self.code
    }

    pub fn err(&self) -> &str {
        &self.err
    }
}

impl Serializable for ErrorPacket {
    fn serialize(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.err.len() + 1);
        buf.resize(HEADER_LEN, 0);
        NetworkEndian::write_u16(&mut buf, OP_ERR);
        NetworkEndian::write_u16(&mut buf[OP_LEN..], self.code.code());
        buf.extend_from_slice(self.err.trim_end_matches('\0').as_bytes());
        buf.push(0);
        buf
    }
}

impl Deserializable for ErrorPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        check_header(buf, OP_ERR)?;

        let code = NetworkEndian::read_u16(&buf[OP_LEN..]);
        let err_type = TFTPError::from_code(code).ok_or_else(|| {
            TFTPParseError::new(format!("Invalid error code [{}]", code).as_str())
        })?;

        // Some servers omit the terminator, take everything up to NUL or the end.
        let body = &buf[HEADER_LEN..];
        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        let msg = String::from_utf8_lossy(&body[..end]);

        Ok(TFTPPacket::ERR(ErrorPacket::new_custom(err_type, &msg)))
    }
}
