use std::str;

use byteorder::{ByteOrder, NetworkEndian};

use crate::tftp::shared::{
    Deserializable, Serializable, TFTPPacket, TFTPParseError, OP_LEN, OP_RRQ, OP_WRQ,
};

pub trait Request: Serializable + Deserializable {
    fn op(&self) -> u16;
    fn filename(&self) -> &str;
    fn mode(&self) -> &str;
}

#[derive(Debug, Eq, PartialEq)]
pub struct ReadRequestPacket {
    req: RequestPacket,
}

impl ReadRequestPacket {
    pub fn new(filename: &str, mode: &str) -> ReadRequestPacket {
        ReadRequestPacket {
            req: RequestPacket::new(OP_RRQ, filename, mode),
        }
    }
}

impl Request for ReadRequestPacket {
    fn op(&self) -> u16 {
        self.req.op
    }

    fn filename(&self) -> &str {
        &self.req.filename
    }

    fn mode(&self) -> &str {
        &self.req.mode
    }
}

impl Serializable for ReadRequestPacket {
    fn serialize(self) -> Vec<u8> {
        self.req.serialize()
    }
}

impl Deserializable for ReadRequestPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        RequestPacket::deserialize(buf)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct WriteRequestPacket {
    req: RequestPacket,
}

impl WriteRequestPacket {
    pub fn new(filename: &str, mode: &str) -> WriteRequestPacket {
        WriteRequestPacket {
            req: RequestPacket::new(OP_WRQ, filename, mode),
        }
    }
}

impl Request for WriteRequestPacket {
    fn op(&self) -> u16 {
        self.req.op
    }

    fn filename(&self) -> &str {
        &self.req.filename
    }

    fn mode(&self) -> &str {
        &self.req.mode
    }
}

impl Serializable for WriteRequestPacket {
    fn serialize(self) -> Vec<u8> {
        self.req.serialize()
    }
}

impl Deserializable for WriteRequestPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        RequestPacket::deserialize(buf)
    }
}

#[derive(Debug, Eq, PartialEq)]
struct RequestPacket {
    op: u16,
    filename: String,
    mode: String,
}

impl RequestPacket {
    fn new(op: u16, filename: &str, mode: &str) -> Self {
        RequestPacket {
            op,
            filename: String::from(filename),
            mode: String::from(mode),
        }
    }
}

/// Splits off one NUL-terminated string, returning it and the remainder.
fn take_cstr(buf: &[u8]) -> Result<(&str, &[u8]), TFTPParseError> {
    let end = buf
        .iter()
        .position(|&byte| byte == 0)
        .ok_or_else(|| TFTPParseError::new("Missing NUL terminator"))?;

    let text = str::from_utf8(&buf[..end]).map_err(|_| TFTPParseError::new("Invalid UTF-8"))?;
    Ok((text, &buf[end + 1..]))
}

impl Serializable for RequestPacket {
    fn serialize(self) -> Vec<u8> {
        // Two separators follow the op code and the strings.
        let length = OP_LEN + self.filename.len() + self.mode.len() + 2;
        let mut buf = Vec::with_capacity(length);
        buf.resize(OP_LEN, 0);
        NetworkEndian::write_u16(&mut buf, self.op);
        buf.extend_from_slice(self.filename.as_bytes());
        buf.push(0);
        buf.extend_from_slice(self.mode.as_bytes());
        buf.push(0);
        buf
    }
}

impl Deserializable for RequestPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        if buf.len() < OP_LEN {
            return Err(TFTPParseError::new("Bad OP code!"));
        }

        let op: u16 = NetworkEndian::read_u16(&buf[0..OP_LEN]);
        if ![OP_RRQ, OP_WRQ].contains(&op) {
            return Err(TFTPParseError::new("Bad OP code!"));
        }

        let (filename, rest) = take_cstr(&buf[OP_LEN..])?;
        let (mode, _) = take_cstr(rest)?;

        if filename.is_empty() || mode.is_empty() {
            return Err(TFTPParseError::new("Empty request field"));
        }

        let packet = if op == OP_RRQ {
            TFTPPacket::RRQ(ReadRequestPacket::new(filename, mode))
        } else {
            TFTPPacket::WRQ(WriteRequestPacket::new(filename, mode))
        };

        Ok(packet)
    }
}
