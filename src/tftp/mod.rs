//! TFTP client: wire codec, session engine and stream adapters.
//!
//! ```text
//! tftp/
//! ├── shared/    # Packet serialization/deserialization
//! ├── session    # One lockstep transfer over a UDP socket
//! ├── reader     # Session in read mode as a byte source
//! ├── writer     # Session in write mode as a byte sink
//! └── client     # Whole-file get/put
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod reader;
pub mod session;
pub mod shared;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{SessionConfig, TransferMode};
pub use error::TransferError;
pub use reader::{ReadOutcome, TftpReader};
pub use session::{Session, SessionState};
pub use writer::TftpWriter;
