//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or decoding protocol data.
///
/// None of these are transient: a peer that produced one of them sent bytes
/// this side cannot interpret, and retrying the same bytes cannot help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame body exceeds [`crate::frame::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Claimed or actual body size
        size: usize,
        /// Maximum allowed body size
        max: usize,
    },

    /// Length prefix announced a zero-byte body.
    #[error("empty frame")]
    EmptyFrame,

    /// Envelope could not be serialized to JSON.
    #[error("JSON encoding failed: {0}")]
    JsonEncode(String),

    /// Frame body is not a valid envelope.
    #[error("JSON decoding failed: {0}")]
    JsonDecode(String),

    /// A successful response carried no `data` where the operation requires it.
    #[error("response is missing data for {expected}")]
    MissingData {
        /// Name of the expected payload type
        expected: &'static str,
    },

    /// Response `data` does not match the shape documented for the operation.
    #[error("response data does not match {expected}: {reason}")]
    InvalidData {
        /// Name of the expected payload type
        expected: &'static str,
        /// Decoder message
        reason: String,
    },
}

