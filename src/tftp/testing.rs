//! Scripted TFTP peers on loopback. Each one answers a single request from
//! a fresh ephemeral port, the way a real server hands out its TID.

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::tftp::config::SessionConfig;
use crate::tftp::shared::ack_packet::AckPacket;
use crate::tftp::shared::data_packet::DataPacket;
use crate::tftp::shared::request_packet::Request;
use crate::tftp::shared::{
    next_block, parse_udp_packet, Serializable, TFTPPacket, MAX_PACKET_LEN, STRIDE_SIZE,
};

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// What a scripted peer observed during one transfer.
#[derive(Debug, Default)]
pub(crate) struct PeerLog {
    pub filename: String,
    /// Payload length of every DATA packet, in order.
    pub data_blocks: Vec<usize>,
    /// Block numbers of every ACK, in order.
    pub acks: Vec<u16>,
    /// Bytes received by a peer accepting a write.
    pub received: Vec<u8>,
}

pub(crate) fn test_config(port: u16) -> SessionConfig {
    SessionConfig::default()
        .with_port(port)
        .with_timeout(Duration::from_millis(200))
}

pub(crate) fn local_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind loopback");
    socket
        .set_read_timeout(Some(PEER_TIMEOUT))
        .expect("set timeout");
    socket
}

/// Stand-in for the well-known port: a loopback socket and its port.
pub(crate) fn listener() -> (UdpSocket, u16) {
    let socket = local_socket();
    let port = socket.local_addr().expect("local addr").port();
    (socket, port)
}

pub(crate) fn recv_packet(socket: &UdpSocket) -> (TFTPPacket, SocketAddr) {
    let mut buf = [0; MAX_PACKET_LEN];
    let (len, src) = socket.recv_from(&mut buf).expect("peer receive");
    let packet = parse_udp_packet(&buf[..len]).expect("valid packet");
    (packet, src)
}

/// Block number of the next datagram, which must be an ACK.
pub(crate) fn recv_ack(socket: &UdpSocket) -> u16 {
    match recv_packet(socket).0 {
        TFTPPacket::ACK(ap) => ap.blk(),
        t => panic!("Expected ACK, got {}", t),
    }
}

/// Counts datagrams until none arrives for `quiet`.
pub(crate) fn count_datagrams(socket: &UdpSocket, quiet: Duration) -> usize {
    let mut buf = [0; MAX_PACKET_LEN];
    socket.set_read_timeout(Some(quiet)).expect("set timeout");

    let mut count = 0;
    while socket.recv_from(&mut buf).is_ok() {
        count += 1;
    }

    socket
        .set_read_timeout(Some(PEER_TIMEOUT))
        .expect("set timeout");
    count
}

/// Answers one RRQ with `contents`, split into 512 byte blocks.
pub(crate) fn serve_file(contents: Vec<u8>) -> (u16, JoinHandle<PeerLog>) {
    let (server, port) = listener();

    let handle = thread::spawn(move || {
        let mut log = PeerLog::default();
        let (rrq, client) = recv_packet(&server);
        match rrq {
            TFTPPacket::RRQ(p) => log.filename = p.filename().to_string(),
            t => panic!("Expected RRQ, got {}", t),
        }

        let data = local_socket();
        let mut blk = 1;
        let mut offset = 0;
        loop {
            let end = usize::min(offset + STRIDE_SIZE, contents.len());
            let chunk = contents[offset..end].to_vec();
            let len = chunk.len();

            data.send_to(&DataPacket::new(blk, chunk).serialize(), client)
                .expect("send data");
            log.data_blocks.push(len);

            match recv_packet(&data).0 {
                TFTPPacket::ACK(ap) => {
                    assert_eq!(ap.blk(), blk);
                    log.acks.push(ap.blk());
                }
                t => panic!("Expected ACK, got {}", t),
            }

            if len < STRIDE_SIZE {
                return log;
            }
            offset = end;
            blk = next_block(blk);
        }
    });

    (port, handle)
}

/// Accepts one WRQ and collects whatever the client uploads.
pub(crate) fn receive_file() -> (u16, JoinHandle<PeerLog>) {
    let (server, port) = listener();

    let handle = thread::spawn(move || {
        let mut log = PeerLog::default();
        let (wrq, client) = recv_packet(&server);
        match wrq {
            TFTPPacket::WRQ(p) => log.filename = p.filename().to_string(),
            t => panic!("Expected WRQ, got {}", t),
        }

        let data = local_socket();
        data.send_to(&AckPacket::new(0).serialize(), client)
            .expect("send ack");
        log.acks.push(0);

        loop {
            let dp = match recv_packet(&data).0 {
                TFTPPacket::DATA(dp) => dp,
                t => panic!("Expected DATA, got {}", t),
            };

            let blk = dp.blk();
            let last = dp.is_final();
            let payload = dp.data();
            log.data_blocks.push(payload.len());
            log.received.extend_from_slice(&payload);

            data.send_to(&AckPacket::new(blk).serialize(), client)
                .expect("send ack");
            log.acks.push(blk);

            if last {
                return log;
            }
        }
    });

    (port, handle)
}
