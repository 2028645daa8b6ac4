use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

use byteorder::{ByteOrder, NetworkEndian};

use crate::tftp::shared::ack_packet::AckPacket;
use crate::tftp::shared::data_packet::DataPacket;
use crate::tftp::shared::err_packet::ErrorPacket;
use crate::tftp::shared::request_packet::*;

pub mod ack_packet;
pub mod data_packet;
pub mod err_packet;
pub mod request_packet;

pub(crate) const OP_LEN: usize = 2;
/// Length of the fixed header (opcode + block number / error code).
pub(crate) const HEADER_LEN: usize = 4;
/// Stride size for reading / writing files.
pub const STRIDE_SIZE: usize = 512;
/// Largest datagram a peer may legally send: header + one full block.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + STRIDE_SIZE;
/// Op code for Read Request
pub const OP_RRQ: u16 = 0x001;
/// Op code for Write Request
pub const OP_WRQ: u16 = 0x002;
/// Op code for Data packet
pub const OP_DATA: u16 = 0x003;
/// Op code for ACK packet
pub const OP_ACK: u16 = 0x004;
/// Op code for Error packet
pub const OP_ERR: u16 = 0x005;

#[derive(Debug, Eq, PartialEq)]
pub enum TFTPPacket {
    RRQ(ReadRequestPacket),
    WRQ(WriteRequestPacket),
    ACK(AckPacket),
    ERR(ErrorPacket),
    DATA(DataPacket),
}

impl TFTPPacket {
    pub fn op(&self) -> u16 {
        match self {
            TFTPPacket::RRQ(_) => OP_RRQ,
            TFTPPacket::WRQ(_) => OP_WRQ,
            TFTPPacket::ACK(_) => OP_ACK,
            TFTPPacket::ERR(_) => OP_ERR,
            TFTPPacket::DATA(_) => OP_DATA,
        }
    }
}

impl Display for TFTPPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let desc = match self {
            TFTPPacket::RRQ(p) => format!("RRQ [{}] [{}]", p.filename(), p.mode()),
            TFTPPacket::WRQ(p) => format!("WRQ [{}] [{}]", p.filename(), p.mode()),
            TFTPPacket::ACK(p) => format!("ACK [{}]", p.blk()),
            TFTPPacket::ERR(p) => format!("ERR [{}]: {}", p.code(), p.err()),
            TFTPPacket::DATA(p) => format!("DATA [{}] ({} bytes)", p.blk(), p.len()),
        };

        write!(f, "{}", desc)
    }
}

pub trait Serializable {
    fn serialize(self) -> Vec<u8>;
}

pub trait Deserializable {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError>;
}

/// Block numbers are 16 bits wide and wrap from 0xFFFF back to 0.
pub fn next_block(blk: u16) -> u16 {
    blk.wrapping_add(1)
}

/// Reads the opcode of a raw datagram and hands it to the matching decoder.
pub fn parse_udp_packet(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
    if buf.len() < OP_LEN {
        return Err(TFTPParseError::new(
            format!("Packet too short [{} bytes]", buf.len()).as_str(),
        ));
    }

    match NetworkEndian::read_u16(buf) {
        OP_RRQ => ReadRequestPacket::deserialize(buf),
        OP_WRQ => WriteRequestPacket::deserialize(buf),
        OP_ACK => AckPacket::deserialize(buf),
        OP_ERR => ErrorPacket::deserialize(buf),
        OP_DATA => DataPacket::deserialize(buf),
        val => Err(TFTPParseError::new(
            format!("Invalid opcode [{}]", val).as_str(),
        )),
    }
}

/// Fails unless `buf` holds at least the opcode and the 16-bit field after it.
pub(crate) fn check_header(buf: &[u8], expected_op: u16) -> Result<(), TFTPParseError> {
    if buf.len() < HEADER_LEN {
        return Err(TFTPParseError::new(
            format!("Packet too short [{} bytes]", buf.len()).as_str(),
        ));
    }

    let op = NetworkEndian::read_u16(buf);
    if op != expected_op {
        return Err(TFTPParseError::new(
            format!("Bad OP code! [{}]", op).as_str(),
        ));
    }

    Ok(())
}

#[derive(Debug, Eq, PartialEq)]
pub struct TFTPParseError {
    details: String,
}

impl Error for TFTPParseError {}

impl TFTPParseError {
    pub(crate) fn new(msg: &str) -> TFTPParseError {
        TFTPParseError {
            details: msg.to_string(),
        }
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

impl fmt::Display for TFTPParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to parse packet: {}", self.details)
    }
}
