//! Error types and handling for the Solis driver
//!
//! One enum covers the whole crate. The split that matters operationally is
//! between failures the register-update loop absorbs (transient fetch
//! problems, a dead socket) and failures it surfaces (addressing bugs,
//! retry exhaustion, bad configuration).

use thiserror::Error;

/// Result type alias for Solis operations
pub type Result<T> = std::result::Result<T, SolisError>;

/// Classification of a transient fetch failure.
///
/// All of these abort only the current update attempt; the retry loop
/// moves on to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Malformed or unexpected protocol frame
    Framing,
    /// Response decoded to the wrong shape (short read, bad payload)
    Decode,
    /// Peer reset the connection mid-exchange
    ConnectionReset,
    /// No response within the operation timeout
    Timeout,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransientKind::Framing => "framing",
            TransientKind::Decode => "decode",
            TransientKind::ConnectionReset => "connection-reset",
            TransientKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Main error type for the Solis driver
#[derive(Debug, Error)]
pub enum SolisError {
    /// Register read outside the configured range, or before the first
    /// successful update. A caller bug; never retried.
    #[error("Addressing error: {message}")]
    Addressing { message: String },

    /// Transient fetch failure, absorbed by the update retry loop
    #[error("Transient {kind} error: {message}")]
    Transient {
        kind: TransientKind,
        message: String,
    },

    /// The transport lost its socket; a reconnect is required before the
    /// next attempt can succeed
    #[error("Transport unavailable: {message}")]
    TransportUnavailable { message: String },

    /// All update attempts exhausted; the cached window is stale
    #[error("Update error: {message}")]
    Update { message: String },

    /// Configuration-related errors (invalid serial, bad config file)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl SolisError {
    /// Create a new addressing error
    pub fn addressing<S: Into<String>>(message: S) -> Self {
        SolisError::Addressing {
            message: message.into(),
        }
    }

    /// Create a new transient fetch error
    pub fn transient<S: Into<String>>(kind: TransientKind, message: S) -> Self {
        SolisError::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Create a new framing error
    pub fn framing<S: Into<String>>(message: S) -> Self {
        Self::transient(TransientKind::Framing, message)
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::transient(TransientKind::Decode, message)
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::transient(TransientKind::Timeout, message)
    }

    /// Create a new connection-reset error
    pub fn connection_reset<S: Into<String>>(message: S) -> Self {
        Self::transient(TransientKind::ConnectionReset, message)
    }

    /// Create a new transport-unavailable error
    pub fn transport_unavailable<S: Into<String>>(message: S) -> Self {
        SolisError::TransportUnavailable {
            message: message.into(),
        }
    }

    /// Create a new update error
    pub fn update<S: Into<String>>(message: S) -> Self {
        SolisError::Update {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SolisError::Config {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        SolisError::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SolisError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                SolisError::connection_reset(err.to_string())
            }
            std::io::ErrorKind::TimedOut => SolisError::timeout(err.to_string()),
            std::io::ErrorKind::NotConnected | std::io::ErrorKind::ConnectionRefused => {
                SolisError::transport_unavailable(err.to_string())
            }
            _ => SolisError::io(err.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for SolisError {
    fn from(err: serde_yaml::Error) -> Self {
        SolisError::Config {
            message: err.to_string(),
        }
    }
}
