use std::io;
use std::io::Write;

use log::{debug, warn};

use crate::tftp::config::SessionConfig;
use crate::tftp::error::{Result, TransferError};
use crate::tftp::session::{Session, SessionState};
use crate::tftp::shared::STRIDE_SIZE;

/// Sequential write access to a file on a TFTP server.
///
/// Bytes are gathered into 512 byte blocks and every full block goes out
/// as soon as it fills up. [`TftpWriter::close`] sends the remainder, which
/// is always shorter than a block (possibly empty) and so tells the server
/// the file is complete. Dropping a writer without closing it abandons the
/// transfer.
///
/// Once a block fails to go through, the transfer is over: the socket is
/// released and every later write or close reports
/// [`TransferError::Aborted`].
///
/// ```rust,no_run
/// use tftp_stream::tftp::TftpWriter;
///
/// let mut writer = TftpWriter::new("192.168.1.100", "config.txt");
/// writer.write_bytes(b"hostname=pxe01\n").unwrap();
/// writer.close().unwrap();
/// ```
pub struct TftpWriter {
    host: String,
    filename: String,
    config: SessionConfig,
    session: Option<Session>,
    buffer: Vec<u8>,
    bytes: usize,
    closed: bool,
    failed: Option<String>,
}

impl TftpWriter {
    pub fn new(host: &str, filename: &str) -> Self {
        TftpWriter::with_config(host, filename, SessionConfig::default())
    }

    pub fn with_config(host: &str, filename: &str, config: SessionConfig) -> Self {
        TftpWriter {
            host: host.to_string(),
            filename: filename.to_string(),
            config,
            session: None,
            buffer: Vec::with_capacity(STRIDE_SIZE),
            bytes: 0,
            closed: false,
            failed: None,
        }
    }

    /// Opens the session and sends the WRQ.
    ///
    /// The first full block does this on its own when it hasn't been called.
    pub fn start(&mut self) -> Result<()> {
        self.check_open()?;

        if let Some(session) = &self.session {
            return Err(TransferError::SessionState {
                expected: SessionState::Idle,
                actual: session.state(),
            });
        }

        let mut session = Session::new(&self.host, self.config.clone())?;
        session.initiate_write(&self.filename, self.config.mode)?;
        self.session = Some(session);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Bytes handed to the server so far, excluding what is still buffered.
    pub fn bytes_sent(&self) -> usize {
        self.bytes
    }

    /// Bytes waiting for the current block to fill up.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte]).map(|_| ())
    }

    /// Buffers all of `data`, sending each block that fills up on the way.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        self.check_open()?;

        let mut written = 0;
        while written < data.len() {
            let len = usize::min(STRIDE_SIZE - self.buffer.len(), data.len() - written);
            self.buffer.extend_from_slice(&data[written..written + len]);
            written += len;

            if self.buffer.len() == STRIDE_SIZE {
                if let Err(e) = self.send_block() {
                    return Err(self.fail(e));
                }
            }
        }

        Ok(written)
    }

    /// Sends the final short block, waits for its ACK and releases the
    /// socket. The writer is closed afterwards even if this fails.
    pub fn close(&mut self) -> Result<()> {
        let result = self.check_open().and_then(|_| self.finish());
        self.closed = true;
        self.session = None;

        if result.is_ok() {
            debug!("Upload of [{}] complete, {} bytes", self.filename, self.bytes);
        }
        result
    }

    fn finish(&mut self) -> Result<()> {
        self.send_block()?;
        self.session()?.finish_write()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(TransferError::Closed);
        }

        match &self.failed {
            Some(reason) => Err(TransferError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Ends the transfer after `err`; nothing buffered will be sent.
    fn fail(&mut self, err: TransferError) -> TransferError {
        warn!("Upload of [{}] failed: {}", self.filename, err);
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

    fn send_block(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.start()?;
        }

        let session = self.session.as_mut().ok_or(TransferError::Closed)?;
        session.write_block(&self.buffer)?;

        self.bytes += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }
}

impl Write for TftpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    /// Full blocks are already on their way; sending a partial one here
    /// would end the transfer, so this does nothing.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for TftpWriter {
    fn drop(&mut self) {
        if !self.closed && self.session.is_some() {
            warn!(
                "Writer for [{}] dropped before close, upload is incomplete",
                self.filename
            );
        }
    }
}
