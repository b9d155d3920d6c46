//! Server error types.

use std::fmt;

use consultoria_proto::ProtocolError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, zero connection limit).
    ///
    /// Fatal: prevents server startup.
    Config(String),

    /// Transport/network error (accept failure, connection I/O).
    ///
    /// Fatal for the affected connection only.
    Transport(String),

    /// A client sent bytes that cannot be framed.
    ///
    /// The connection is closed; other clients are unaffected.
    Protocol(ProtocolError),

    /// Internal error (a response that could not be serialized).
    ///
    /// Indicates a bug.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
