use byteorder::{ByteOrder, NetworkEndian};

use crate::tftp::shared::{
    check_header, Deserializable, Serializable, TFTPPacket, TFTPParseError, HEADER_LEN, OP_DATA,
    OP_LEN, STRIDE_SIZE,
};

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct DataPacket {
    blk: u16,
    data: Vec<u8>,
}

impl DataPacket {
    pub fn new(blk: u16, data: Vec<u8>) -> Self {
        DataPacket { blk, data }
    }

    pub fn blk(&self) -> u16 {
        self.blk
    }

    pub fn data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A block shorter than the stride ends the transfer.
    pub fn is_final(&self) -> bool {
        self.data.len() < STRIDE_SIZE
    }
}

/// Encodes a DATA packet straight from a borrowed payload.
pub fn encode_data(blk: u16, data: &[u8]) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::with_capacity(HEADER_LEN + data.len());
    buf.resize(HEADER_LEN, 0);
    NetworkEndian::write_u16(&mut buf, OP_DATA);
    NetworkEndian::write_u16(&mut buf[OP_LEN..], blk);
    buf.extend_from_slice(data);
    buf
}

impl Serializable for DataPacket {
    fn serialize(self) -> Vec<u8> {
        encode_data(self.blk, &self.data)
    }
}

impl Deserializable for DataPacket {
    fn deserialize(buf: &[u8]) -> Result<TFTPPacket, TFTPParseError> {
        check_header(buf, OP_DATA)?;

        let blk = NetworkEndian::read_u16(&buf[OP_LEN..HEADER_LEN]);
        let data = &buf[HEADER_LEN..];

        if data.len() > STRIDE_SIZE {
            return Err(TFTPParseError::new("Invalid data length"));
        }

        let p = DataPacket::new(blk, data.to_vec());
        Ok(TFTPPacket::DATA(p))
    }
}

#[cfg(test)]
mod tests {
    use crate::tftp::shared::data_packet::{encode_data, DataPacket};
    use crate::tftp::shared::{Deserializable, Serializable, TFTPPacket, STRIDE_SIZE};

    #[test]
    fn serialize_data_packet() {
        let p = DataPacket::new(0x0102, vec![b'h', b'i']);
        assert_eq!(p.serialize(), vec![0, 3, 1, 2, b'h', b'i']);
    }

    #[test]
    fn serialize_empty_block() {
        assert_eq!(encode_data(7, &[]), vec![0, 3, 0, 7]);
    }

    #[test]
    fn deserialize_data_packet() {
        let mut buf = vec![0, 3, 0, 9];
        buf.extend_from_slice(&[0x55; STRIDE_SIZE]);

        match DataPacket::deserialize(&buf).unwrap() {
            TFTPPacket::DATA(p) => {
                assert_eq!(p.blk(), 9);
                assert!(!p.is_final());
                assert_eq!(p.data(), vec![0x55; STRIDE_SIZE]);
            }
            t => panic!("Wrong packet type {:?}", t),
        }
    }

    #[test]
    fn zero_length_block_is_final() {
        match DataPacket::deserialize(&[0, 3, 0, 2]).unwrap() {
            TFTPPacket::DATA(p) => {
                assert!(p.is_empty());
                assert!(p.is_final());
            }
            t => panic!("Wrong packet type {:?}", t),
        }
    }

    #[test]
    fn deserialize_error() {
        let err = DataPacket::deserialize(&[0, 4, 0, 1]).unwrap_err();
        assert_eq!(err.details(), "Bad OP code! [4]");

        let mut oversized = vec![0, 3, 0, 1];
        oversized.extend_from_slice(&[0; STRIDE_SIZE + 1]);
        let err = DataPacket::deserialize(&oversized).unwrap_err();
        assert_eq!(err.details(), "Invalid data length");
    }
}
