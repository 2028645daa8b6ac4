use std::io;
use std::io::Read;

use log::{debug, warn};

use crate::tftp::config::SessionConfig;
use crate::tftp::error::{Result, TransferError};
use crate::tftp::session::{Session, SessionState};
use crate::tftp::shared::STRIDE_SIZE;

/// Result of a bulk read: some bytes, or the end of the remote file.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ReadOutcome {
    Bytes(usize),
    EndOfStream,
}

/// Sequential read access to a file on a TFTP server.
///
/// Holds one 512 byte block at a time and pulls the next one from the
/// session once the cursor runs off its end. A block shorter than 512
/// bytes marks the end of the file; nothing is sent on the network after
/// it has been consumed.
///
/// A failed block fetch ends the transfer. Bytes already copied by that
/// call are still returned, the failure comes out of the next read and
/// every read after it reports [`TransferError::Aborted`].
///
/// ```rust,no_run
/// use std::io::Read;
/// use tftp_stream::tftp::TftpReader;
///
/// let mut reader = TftpReader::new("192.168.1.100", "pxelinux.0");
/// let mut contents = Vec::new();
/// reader.read_to_end(&mut contents).unwrap();
/// reader.close();
/// ```
pub struct TftpReader {
    host: String,
    filename: String,
    config: SessionConfig,
    session: Option<Session>,
    buffer: Vec<u8>,
    pos: usize,
    last_block: bool,
    eof: bool,
    closed: bool,
    pending: Option<TransferError>,
    failed: Option<String>,
}

impl TftpReader {
    pub fn new(host: &str, filename: &str) -> Self {
        TftpReader::with_config(host, filename, SessionConfig::default())
    }

    pub fn with_config(host: &str, filename: &str, config: SessionConfig) -> Self {
        TftpReader {
            host: host.to_string(),
            filename: filename.to_string(),
            config,
            session: None,
            buffer: Vec::with_capacity(STRIDE_SIZE),
            pos: 0,
            last_block: false,
            eof: false,
            closed: false,
            pending: None,
            failed: None,
        }
    }

    /// Opens the session and sends the RRQ.
    ///
    /// The first read does this on its own; calling it up front surfaces
    /// resolution and socket errors before any data is expected.
    pub fn start(&mut self) -> Result<()> {
        self.check_open()?;

        if self.is_started() {
            let actual = self
                .session
                .as_ref()
                .map_or(SessionState::Closed, Session::state);
            return Err(TransferError::SessionState {
                expected: SessionState::Idle,
                actual,
            });
        }

        let mut session = Session::new(&self.host, self.config.clone())?;
        session.initiate_read(&self.filename, self.config.mode)?;
        self.session = Some(session);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some() || self.last_block
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Bytes left in the current block.
    pub fn available(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Reads a single byte, `None` at the end of the file.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_open()?;

        while self.pos >= self.buffer.len() {
            if self.eof {
                return Ok(None);
            }
            self.refill()?;
        }

        let byte = self.buffer[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Fills `buf` from as many blocks as needed, stopping early at the
    /// end of the file.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        self.check_open()?;

        let mut copied = 0;
        while copied < buf.len() {
            if self.pos < self.buffer.len() {
                let len = usize::min(self.buffer.len() - self.pos, buf.len() - copied);
                buf[copied..copied + len].copy_from_slice(&self.buffer[self.pos..self.pos + len]);
                copied += len;
                self.pos += len;
            } else if self.eof {
                break;
            } else if let Err(e) = self.refill() {
                if copied == 0 {
                    return Err(e);
                }
                self.pending = Some(e);
                break;
            }
        }

        if copied == 0 && self.eof {
            return Ok(ReadOutcome::EndOfStream);
        }

        Ok(ReadOutcome::Bytes(copied))
    }

    /// Skips up to `n` bytes of the current block only.
    pub fn skip(&mut self, n: usize) -> usize {
        let len = usize::min(n, self.available());
        self.pos += len;
        len
    }

    pub fn mark(&mut self) -> Result<()> {
        Err(TransferError::Unsupported("mark"))
    }

    pub fn reset(&mut self) -> Result<()> {
        Err(TransferError::Unsupported("reset"))
    }

    /// Marks the reader closed and releases its socket.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("Reader for [{}] closed before end of file", self.filename);
        }
        self.closed = true;
    }

    fn check_open(&mut self) -> Result<()> {
        if self.closed {
            return Err(TransferError::Closed);
        }

        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        match &self.failed {
            Some(reason) => Err(TransferError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: TransferError) -> TransferError {
        warn!("Download of [{}] failed: {}", self.filename, err);
        self.failed = Some(err.to_string());
        self.session = None;
        err
    }

    fn session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            self.start()?;
        }

        self.session.as_mut().ok_or(TransferError::Closed)
    }

    fn refill(&mut self) -> Result<()> {
        if self.last_block {
            self.eof = true;
            return Ok(());
        }

        let block = match self.session().and_then(|session| session.read_block()) {
            Ok(block) => block,
            Err(e) => return Err(self.fail(e)),
        };
        self.last_block = block.len() < STRIDE_SIZE;
        self.buffer = block;
        self.pos = 0;

        if self.last_block {
            // Transfer is complete, the socket has no further use.
            self.session = None;
        }

        Ok(())
    }
}

impl Read for TftpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_chunk(buf)? {
            ReadOutcome::Bytes(len) => Ok(len),
            ReadOutcome::EndOfStream => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::thread;
    use std::time::Duration;

    use crate::tftp::error::TransferError;
    use crate::tftp::reader::{ReadOutcome, TftpReader};
    use crate::tftp::session::SessionState;
    use crate::tftp::shared::data_packet::DataPacket;
    use crate::tftp::shared::Serializable;
    use crate::tftp::testing::{
        count_datagrams, listener, local_socket, recv_ack, recv_packet, serve_file, test_config,
    };

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn get_of_1024_bytes_uses_three_blocks() {
        let contents = pattern(1024);
        let (port, peer) = serve_file(contents.clone());

        let mut reader = TftpReader::with_config("127.0.0.1", "kernel.img", test_config(port));
        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        reader.close();

        let log = peer.join().unwrap();
        assert_eq!(received, contents);
        assert_eq!(log.filename, "kernel.img");
        assert_eq!(log.data_blocks, vec![512, 512, 0]);
        assert_eq!(log.acks, vec![1, 2, 3]);
    }

    #[test]
    fn get_of_100_bytes_is_a_single_block() {
        let contents = pattern(100);
        let (port, peer) = serve_file(contents.clone());

        let mut reader = TftpReader::with_config("127.0.0.1", "small.txt", test_config(port));
        let mut buf = [0; 512];
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), ReadOutcome::Bytes(100));
        assert_eq!(&buf[..100], contents.as_slice());
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), ReadOutcome::EndOfStream);
        assert!(reader.is_eof());
        assert_eq!(reader.read_byte().unwrap(), None);

        let log = peer.join().unwrap();
        assert_eq!(log.data_blocks, vec![100]);
        assert_eq!(log.acks, vec![1]);
    }

    #[test]
    fn empty_file_ends_immediately() {
        let (port, peer) = serve_file(Vec::new());

        let mut reader = TftpReader::with_config("127.0.0.1", "empty", test_config(port));
        assert_eq!(reader.read_byte().unwrap(), None);

        let log = peer.join().unwrap();
        assert_eq!(log.data_blocks, vec![0]);
    }

    #[test]
    fn byte_reads_cross_block_boundaries() {
        let contents = pattern(515);
        let (port, _peer) = serve_file(contents.clone());

        let mut reader = TftpReader::with_config("127.0.0.1", "f", test_config(port));
        assert!(!reader.is_started());

        let mut received = Vec::new();
        while let Some(byte) = reader.read_byte().unwrap() {
            received.push(byte);
        }
        assert_eq!(received, contents);
    }

    #[test]
    fn skip_stays_within_current_block() {
        let contents = pattern(600);
        let (port, _peer) = serve_file(contents.clone());

        let mut reader = TftpReader::with_config("127.0.0.1", "f", test_config(port));
        assert_eq!(reader.skip(10), 0);

        reader.start().unwrap();
        assert_eq!(reader.read_byte().unwrap(), Some(contents[0]));
        assert_eq!(reader.available(), 511);
        assert_eq!(reader.skip(1000), 511);
        assert_eq!(reader.available(), 0);
        assert_eq!(reader.read_byte().unwrap(), Some(contents[512]));
    }

    #[test]
    fn explicit_start_happens_once() {
        let (port, _peer) = serve_file(pattern(10));

        let mut reader = TftpReader::with_config("127.0.0.1", "f", test_config(port));
        reader.start().unwrap();
        assert!(reader.is_started());
        assert!(matches!(
            reader.start().unwrap_err(),
            TransferError::SessionState { actual: SessionState::Reading, .. }
        ));

        reader.read_to_end(&mut Vec::new()).unwrap();
        assert!(matches!(
            reader.start().unwrap_err(),
            TransferError::SessionState { actual: SessionState::Closed, .. }
        ));
    }

    #[test]
    fn stalled_download_keeps_copied_bytes_then_fails() {
        let contents = pattern(512);
        let (server, port) = listener();

        let block = contents.clone();
        let peer = thread::spawn(move || {
            let (_, client) = recv_packet(&server);
            let data = local_socket();
            data.send_to(&DataPacket::new(1, block).serialize(), client)
                .unwrap();
            let ack = recv_ack(&data);
            (ack, count_datagrams(&data, Duration::from_millis(400)))
        });

        let mut reader = TftpReader::with_config("127.0.0.1", "stall.bin", test_config(port));
        let mut buf = [0; 600];
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), ReadOutcome::Bytes(512));
        assert_eq!(&buf[..512], contents.as_slice());

        assert!(matches!(
            reader.read_chunk(&mut buf),
            Err(TransferError::Timeout { attempts: 3 })
        ));
        assert!(matches!(reader.read_byte(), Err(TransferError::Aborted(_))));
        assert!(!reader.is_eof());

        // The lost first ACK is repeated on each timeout but the last.
        assert_eq!(peer.join().unwrap(), (1, 2));
    }

    #[test]
    fn mark_and_reset_are_unsupported() {
        let mut reader = TftpReader::new("127.0.0.1", "f");
        assert!(matches!(reader.mark(), Err(TransferError::Unsupported("mark"))));
        assert!(matches!(reader.reset(), Err(TransferError::Unsupported("reset"))));
    }

    #[test]
    fn reads_fail_after_close() {
        let mut reader = TftpReader::new("127.0.0.1", "f");
        reader.close();

        assert!(matches!(reader.read_byte(), Err(TransferError::Closed)));
        let mut buf = [0; 4];
        assert!(matches!(reader.read_chunk(&mut buf), Err(TransferError::Closed)));
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            std::io::ErrorKind::BrokenPipe
        );
    }
}
