//! ACK packets are acknowledged by  DATA  or ERROR packets.
//! the opcode is 4.
//!
//! The  block  number  in an  ACK echoes
//! the block number of the DATA packet being acknowledged.
//!
//! A WRQ is acknowledged with an ACK packet having a
//! block number of zero.

use byteorder::{ByteOrder, NetworkEndian};

use crate::tftp::shared::{
    check_header, Deserializable, Serializable, TFTPPacket, TFTPParseError, OP_ACK, OP_LEN,
};

const ACK_LEN: usize = 4;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct AckPacket {
    blk: u16,
}

impl AckPacket {
    pub fn new(blk: u16) -> Self {
        AckPacket { blk }
    }

    pub fn blk(&self) -> u16 {
        self.blk
    }
}

impl Serializable for AckPacket {
    fn serialize(self) -> Vec<u8> {
        let mut buf = vec![0; ACK_LEN];
        NetworkEndian::write_u16(&mut buf, OP_ACK);
        NetworkEndian::write_u16(&mut buf[OP_LEN..], self.blk);
        buf
    }
}

impl Deserializable for AckPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        check_header(buf, OP_ACK)?;

        let blk = NetworkEndian::read_u16(&buf[OP_LEN..]);
        Ok(TFTPPacket::ACK(AckPacket::new(blk)))
    }
}
