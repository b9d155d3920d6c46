//! Length-prefixed frame codec.
//!
//! A `Frame` is the transport-layer unit:
//! - 4-byte unsigned body length (Big Endian)
//! - `length` bytes of body (a UTF-8 JSON envelope)
//!
//! This is a pure data holder. Envelope logic lives in [`crate::envelope`];
//! see `Request::to_frame()` and `Response::from_frame()`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Size of the length prefix preceding every body.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum body size (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Complete protocol frame (transport layer).
///
/// Layout on the wire: `[length: u32 BE] + [body: length bytes]`
///
/// # Invariants
///
/// - Non-empty: a decoded frame always has `1..=MAX_FRAME_SIZE` body bytes.
///   Frames built with [`Frame::new`] are checked when encoded.
/// - Completeness: [`Frame::decode`] only yields a frame once every body byte
///   has arrived. A partial frame is never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    body: Bytes,
}

impl Frame {
    /// Wrap an already-encoded body.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Body bytes (without the length prefix).
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the frame and return its body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Number of bytes this frame occupies on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body.len()
    }

    /// Encode frame into buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyFrame` if the body is empty
    /// - `ProtocolError::FrameTooLarge` if the body exceeds `MAX_FRAME_SIZE`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.body.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }

        let len = u32::try_from(self.body.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_SIZE)
            .ok_or(ProtocolError::FrameTooLarge {
                size: self.body.len(),
                max: MAX_FRAME_SIZE as usize,
            })?;

        dst.put_u32(len);
        dst.put_slice(&self.body);

        Ok(())
    }

    /// Decode the next complete frame from a stream buffer.
    ///
    /// Returns `Ok(None)` when `src` does not yet hold a complete frame; the
    /// buffer is left untouched so more bytes can be appended. On success the
    /// frame's bytes are consumed from `src`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptyFrame` if the prefix announces zero bytes
    /// - `ProtocolError::FrameTooLarge` if the prefix exceeds `MAX_FRAME_SIZE`
    ///
    /// Both are fatal for the stream: after a bad prefix there is no way to
    /// find the next frame boundary.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
        let len = u32::from_be_bytes(prefix);

        if len == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len as usize,
                max: MAX_FRAME_SIZE as usize,
            });
        }

        let total = LENGTH_PREFIX_SIZE + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let body = src.split_to(len as usize).freeze();

        debug_assert_eq!(body.len(), len as usize);

        Ok(Some(Self { body }))
    }
}
