use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Well-known port a TFTP server accepts requests on.
pub const TFTP_PORT: u16 = 69;
/// How long a single attempt waits for the peer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Attempts per block exchange before giving up.
pub const DEFAULT_RETRIES: u32 = 3;

/// Mode string carried by RRQ/WRQ. Data is always moved as raw bytes.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum TransferMode {
    Octet,
    NetAscii,
}

impl TransferMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferMode::Octet => "octet",
            TransferMode::NetAscii => "netascii",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "octet" => Ok(TransferMode::Octet),
            "netascii" => Ok(TransferMode::NetAscii),
            other => Err(format!("Unknown transfer mode [{}]", other)),
        }
    }
}

/// Knobs for one transfer session.
///
/// ```rust
/// use std::time::Duration;
/// use tftp_stream::tftp::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_port(6969)
///     .with_timeout(Duration::from_secs(2));
/// assert_eq!(config.retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Port the initiating request is sent to.
    pub port: u16,
    /// Receive timeout for each attempt.
    pub timeout: Duration,
    /// Attempts per block exchange.
    pub retries: u32,
    /// Mode the stream adapters request.
    pub mode: TransferMode,
}

impl SessionConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// At least one attempt is always made; `0` is treated as `1`.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: TFTP_PORT,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            mode: TransferMode::Octet,
        }
    }
}
