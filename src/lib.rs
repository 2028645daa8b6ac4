//! Client side of the Trivial File Transfer Protocol (RFC 1350).
//!
//! Files are moved one 512 byte block at a time over UDP, each block
//! acknowledged before the next one is sent. [`tftp::TftpReader`] and
//! [`tftp::TftpWriter`] expose a transfer as an ordinary byte stream.

pub mod tftp;
