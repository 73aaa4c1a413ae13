//! Result codes reported by a protocol engine
//!
//! Engines wrapping a C library usually report integer codes; [`EngineError::from_code`]
//! maps the conventional numbering (0 = success, 7 = connection lost, ...) onto
//! typed variants so the driver can classify them.

use thiserror::Error;

/// Numeric code an engine reports for a lost connection
pub const CONNECTION_LOST_CODE: i32 = 7;

/// Errors returned by [`ProtocolEngine`](super::ProtocolEngine) operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Connection pending")]
    ConnectionPending,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Protocol error")]
    Protocol,
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("No connection to broker")]
    NoConnection,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Not found")]
    NotFound,
    #[error("Connection lost")]
    ConnectionLost,
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("Payload too large: {size} bytes")]
    PayloadSize { size: usize },
    #[error("Operation not supported")]
    NotSupported,
    #[error("Authentication failed")]
    Auth,
    #[error("Access denied by ACL")]
    AclDenied,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Name resolution failed: {0}")]
    Lookup(String),
    #[error("Unknown engine error (code {0})")]
    Unknown(i32),
}

impl EngineError {
    /// True when the engine reports that an established connection went away.
    /// This is the only step result the driver recovers from.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, EngineError::ConnectionLost)
    }

    /// Connectivity problems that reconnect-with-backoff is expected to cure
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::ConnectionLost
                | EngineError::ConnectionRefused
                | EngineError::NoConnection
                | EngineError::ConnectionPending
                | EngineError::Io(_)
                | EngineError::Lookup(_)
        )
    }

    /// Map a conventional engine return code to an error. `0` is success.
    pub fn from_code(code: i32) -> Option<Self> {
        let error = match code {
            0 => return None,
            -1 => EngineError::ConnectionPending,
            1 => EngineError::OutOfMemory,
            2 => EngineError::Protocol,
            3 => EngineError::InvalidParameters(String::new()),
            4 => EngineError::NoConnection,
            5 => EngineError::ConnectionRefused,
            6 => EngineError::NotFound,
            CONNECTION_LOST_CODE => EngineError::ConnectionLost,
            8 => EngineError::Tls(String::new()),
            9 => EngineError::PayloadSize { size: 0 },
            10 => EngineError::NotSupported,
            11 => EngineError::Auth,
            12 => EngineError::AclDenied,
            14 => EngineError::Io(std::io::Error::last_os_error()),
            15 => EngineError::Lookup(String::new()),
            other => EngineError::Unknown(other),
        };
        Some(error)
    }

    /// Inverse of [`EngineError::from_code`]
    pub fn code(&self) -> i32 {
        match self {
            EngineError::ConnectionPending => -1,
            EngineError::OutOfMemory => 1,
            EngineError::Protocol => 2,
            EngineError::InvalidParameters(_) => 3,
            EngineError::NoConnection => 4,
            EngineError::ConnectionRefused => 5,
            EngineError::NotFound => 6,
            EngineError::ConnectionLost => CONNECTION_LOST_CODE,
            EngineError::Tls(_) => 8,
            EngineError::PayloadSize { .. } => 9,
            EngineError::NotSupported => 10,
            EngineError::Auth => 11,
            EngineError::AclDenied => 12,
            EngineError::Io(_) => 14,
            EngineError::Lookup(_) => 15,
            EngineError::Unknown(code) => *code,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
