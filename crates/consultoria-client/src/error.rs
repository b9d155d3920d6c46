//! Error types for the client.
//!
//! Two layers: [`TransportError`] for the byte channel, and [`SessionError`]
//! for everything a caller of the session layer or an action service can
//! observe.

use std::{io, time::Duration};

use consultoria_proto::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Establishing the channel failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Operation needs an open channel.
    #[error("not connected")]
    NotConnected,

    /// Reading or writing the channel failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The frame cannot be put on the wire.
    #[error("unencodable frame: {0}")]
    Encode(#[from] ProtocolError),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced to callers of the session layer and the action services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Endpoint unreachable, write failed, or the connection dropped while the
    /// request was outstanding.
    #[error("connection error: {0}")]
    Connection(String),

    /// No correlated response arrived before the deadline.
    #[error("request timed out after {elapsed:?}")]
    Timeout {
        /// Deadline that elapsed
        elapsed: Duration,
    },

    /// The server refused a LOGIN or REGISTER.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message supplied by the server
        message: String,
    },

    /// The call needs a session and none is present, or the server rejected
    /// the attached one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The server replied with something that does not fit the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered `success = false` for a non-AUTH operation.
    #[error("{message}")]
    Rejected {
        /// Message supplied by the server
        message: String,
    },

    /// Reading or writing the persisted session record failed.
    #[error("session store error: {0}")]
    Store(String),
}

impl SessionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Retrying is always the caller's decision; the layer itself never
    /// resends a request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Encode(e) => Self::Protocol(e),
            other => Self::Connection(other.to_string()),
        }
    }
}
