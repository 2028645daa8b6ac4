use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Instant;

use log::{debug, warn};

use crate::tftp::config::{SessionConfig, TransferMode};
use crate::tftp::error::{Result, TransferError};
use crate::tftp::shared::ack_packet::AckPacket;
use crate::tftp::shared::data_packet::encode_data;
use crate::tftp::shared::err_packet::{ErrorPacket, TFTPError};
use crate::tftp::shared::request_packet::{ReadRequestPacket, WriteRequestPacket};
use crate::tftp::shared::{
    next_block, parse_udp_packet, Serializable, TFTPPacket, OP_ACK, OP_DATA, OP_LEN, STRIDE_SIZE,
};

/// Room for a full DATA packet plus slack, so oversized blocks are seen
/// as such instead of being silently truncated.
const RECV_BUF_LEN: usize = 1024;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SessionState {
    Idle,
    Reading,
    Writing,
    Closed,
}

/// One lockstep transfer with a remote TFTP server.
///
/// A session starts `Idle`, is moved to `Reading` or `Writing` exactly once
/// by [`Session::initiate_read`] / [`Session::initiate_write`], and ends up
/// `Closed` when the terminal block has been exchanged. The UDP socket is
/// owned by the session and released when it is dropped.
pub struct Session {
    socket: UdpSocket,
    remote: IpAddr,
    remote_tid: Option<u16>,
    state: SessionState,
    blk: u16,
    terminal_sent: bool,
    last_packet: Vec<u8>,
    last_dest: SocketAddr,
    config: SessionConfig,
    recv_buf: Vec<u8>,
}

impl Session {
    /// Resolves `host` and binds an ephemeral local port for the transfer.
    pub fn new(host: &str, config: SessionConfig) -> Result<Self> {
        let remote = resolve(host, config.port)?;
        let local: SocketAddr = match remote {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)?;
        debug!(
            "Session {} -> {} (port {})",
            socket.local_addr()?,
            remote,
            config.port
        );

        Ok(Session {
            socket,
            remote,
            remote_tid: None,
            state: SessionState::Idle,
            blk: 0,
            terminal_sent: false,
            last_packet: Vec::new(),
            last_dest: SocketAddr::new(remote, config.port),
            config,
            recv_buf: vec![0; RECV_BUF_LEN],
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remote_addr(&self) -> IpAddr {
        self.remote
    }

    /// The server's transfer ID, known once its first reply arrived.
    pub fn remote_tid(&self) -> Option<u16> {
        self.remote_tid
    }

    /// Block number of the exchange currently in progress.
    pub fn blk(&self) -> u16 {
        self.blk
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Sends a RRQ; the first DATA block expected back is #1.
    pub fn initiate_read(&mut self, filename: &str, mode: TransferMode) -> Result<()> {
        self.begin(SessionState::Reading)?;
        self.blk = 1;

        let rrq = ReadRequestPacket::new(filename, mode.as_str());
        debug!("RRQ [{}] [{}]", filename, mode);
        self.send_packet(rrq.serialize(), self.request_addr())
    }

    /// Sends a WRQ; the server answers it with ACK #0.
    pub fn initiate_write(&mut self, filename: &str, mode: TransferMode) -> Result<()> {
        self.begin(SessionState::Writing)?;
        self.blk = 0;

        let wrq = WriteRequestPacket::new(filename, mode.as_str());
        debug!("WRQ [{}] [{}]", filename, mode);
        self.send_packet(wrq.serialize(), self.request_addr())
    }

    /// Waits for the next DATA block, acknowledges it and returns its payload.
    ///
    /// A payload shorter than 512 bytes (possibly empty) is the last one;
    /// the session is closed after returning it.
    pub fn read_block(&mut self) -> Result<Vec<u8>> {
        self.expect_state(SessionState::Reading)?;

        let data = match self.await_reply(OP_DATA)? {
            TFTPPacket::DATA(dp) => dp.data(),
            other => return Err(unexpected(&other)),
        };

        debug!("ON_DATA #{} ({} bytes)", self.blk, data.len());
        let ack = AckPacket::new(self.blk);
        self.send_packet(ack.serialize(), self.peer_addr())?;
        self.blk = next_block(self.blk);

        if data.len() < STRIDE_SIZE {
            debug!("Final block received, session closed");
            self.state = SessionState::Closed;
        }

        Ok(data)
    }

    /// Waits for the ACK of the previous block (#0 acknowledges the WRQ),
    /// then sends `data` as the next DATA block.
    ///
    /// Passing fewer than 512 bytes sends the terminal block; only
    /// [`Session::finish_write`] may follow it.
    pub fn write_block(&mut self, data: &[u8]) -> Result<()> {
        self.expect_state(SessionState::Writing)?;

        if data.len() > STRIDE_SIZE {
            return Err(TransferError::BlockTooLarge(data.len()));
        }

        if self.terminal_sent {
            return Err(TransferError::Closed);
        }

        self.await_reply(OP_ACK)?;
        debug!("ON_ACK #{}", self.blk);

        self.blk = next_block(self.blk);
        debug!("DO_DATA #{} ({} bytes)", self.blk, data.len());
        self.send_packet(encode_data(self.blk, data), self.peer_addr())?;

        if data.len() < STRIDE_SIZE {
            self.terminal_sent = true;
        }

        Ok(())
    }

    /// Waits for the ACK of the terminal block and closes the session.
    ///
    /// Fails without touching the network unless a block shorter than
    /// 512 bytes has been sent.
    pub fn finish_write(&mut self) -> Result<()> {
        self.expect_state(SessionState::Writing)?;

        if !self.terminal_sent {
            return Err(TransferError::Protocol(format!(
                "Cannot finish upload, block #{} was not a final block",
                self.blk
            )));
        }

        self.await_reply(OP_ACK)?;
        debug!("ON_ACK #{} (final), session closed", self.blk);
        self.state = SessionState::Closed;

        Ok(())
    }

    fn begin(&mut self, next: SessionState) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(TransferError::SessionState {
                expected: SessionState::Idle,
                actual: self.state,
            });
        }

        debug!("Moving to {:?}", next);
        self.state = next;
        Ok(())
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(TransferError::SessionState {
                expected,
                actual: self.state,
            });
        }

        Ok(())
    }

    fn request_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote, self.config.port)
    }

    fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote, self.remote_tid.unwrap_or(self.config.port))
    }

    /// Runs the retry loop until a reply of type `expected_op` carrying the
    /// current block number shows up.
    ///
    /// A timed out attempt resends the last packet while attempts remain. A
    /// reply with the wrong block number uses up an attempt without a resend.
    fn await_reply(&mut self, expected_op: u16) -> Result<TFTPPacket> {
        let attempts = self.config.retries;

        for attempt in 1..=attempts {
            let len = match self.receive_from_peer()? {
                Some(len) => len,
                None => {
                    if attempt < attempts {
                        warn!(
                            "No reply for block #{}, retransmitting ({}/{})",
                            self.blk, attempt, attempts
                        );
                        self.retransmit()?;
                    }
                    continue;
                }
            };

            if len <= OP_LEN {
                return Err(TransferError::Protocol(format!(
                    "Invalid packet length received [{}]",
                    len
                )));
            }

            let packet = parse_udp_packet(&self.recv_buf[..len])?;
            let blk = match &packet {
                TFTPPacket::ERR(ep) => {
                    return Err(TransferError::Server {
                        code: ep.kind(),
                        message: ep.err().to_string(),
                    })
                }
                TFTPPacket::DATA(dp) if expected_op == OP_DATA => dp.blk(),
                TFTPPacket::ACK(ap) if expected_op == OP_ACK => ap.blk(),
                other => return Err(unexpected(other)),
            };

            if blk == self.blk {
                return Ok(packet);
            }

            warn!(
                "Ignoring block #{}, expected #{} ({}/{})",
                blk, self.blk, attempt, attempts
            );
        }

        Err(TransferError::Timeout { attempts })
    }

    /// Receives one datagram from the peer within a single timeout window.
    ///
    /// Datagrams from anyone else are answered with "Unknown transfer ID"
    /// and dropped; they don't extend the window. Returns `None` on timeout.
    fn receive_from_peer(&mut self) -> Result<Option<usize>> {
        let deadline = Instant::now() + self.config.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            self.socket.set_read_timeout(Some(remaining))?;
            let (len, src) = match self.socket.recv_from(&mut self.recv_buf) {
                Ok(received) => received,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            };

            if self.accept_source(src) {
                return Ok(Some(len));
            }

            self.reject_stray(src)?;
        }
    }

    /// Locks the remote TID on the first datagram from the remote host.
    fn accept_source(&mut self, src: SocketAddr) -> bool {
        if src.ip() != self.remote {
            return false;
        }

        match self.remote_tid {
            Some(tid) => tid == src.port(),
            None => {
                debug!("Remote TID locked to {}", src.port());
                self.remote_tid = Some(src.port());
                true
            }
        }
    }

    fn reject_stray(&self, src: SocketAddr) -> Result<()> {
        warn!("Datagram from unknown TID {}, rejecting", src);
        let err = ErrorPacket::new(TFTPError::UnknownTID);
        self.socket.send_to(&err.serialize(), src)?;
        Ok(())
    }

    fn send_packet(&mut self, packet: Vec<u8>, dest: SocketAddr) -> Result<()> {
        self.socket.send_to(&packet, dest)?;
        self.last_packet = packet;
        self.last_dest = dest;
        Ok(())
    }

    fn retransmit(&self) -> Result<()> {
        self.socket.send_to(&self.last_packet, self.last_dest)?;
        Ok(())
    }
}

fn unexpected(packet: &TFTPPacket) -> TransferError {
    TransferError::Protocol(format!("Unexpected packet {}", packet))
}

fn resolve(host: &str, port: u16) -> Result<IpAddr> {
    let resolution_error = |reason: String| TransferError::HostResolution {
        host: host.to_string(),
        reason,
    };

    (host, port)
        .to_socket_addrs()
        .map_err(|e| resolution_error(e.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| resolution_error(String::from("no addresses found")))
}
