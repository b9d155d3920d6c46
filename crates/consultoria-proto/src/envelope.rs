//! Request and response envelopes.
//!
//! Both envelopes are JSON objects carried as a single [`Frame`] body. A
//! request names its action with a `type` (the action family) and a `data`
//! object whose `action` field selects the operation. A response echoes the
//! request's `requestId` so the client can correlate it regardless of the
//! order in which responses arrive.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    errors::{ProtocolError, Result},
    frame::Frame,
    payloads::Action,
};

/// Correlation key attached to a request and echoed by its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap a correlation key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token proving an authenticated session.
///
/// `Debug` only shows a short prefix so the token never ends up in logs.
/// There is intentionally no `Display` impl.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    const SHORT_LEN: usize = 8;

    /// Wrap a session token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the full token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix of the token that is safe to log.
    #[must_use]
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(Self::SHORT_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}..)", self.short())
    }
}

/// Machine-readable failure reason carried next to the human message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The attached session token is unknown or expired.
    SessionInvalid,
    /// The request was malformed or missing required fields.
    InvalidRequest,
    /// The action family or operation is not supported.
    UnknownAction,
    /// A referenced entity does not exist.
    NotFound,
    /// The caller is not allowed to touch the referenced entity.
    Forbidden,
    /// The server failed while handling an otherwise valid request.
    Internal,
    /// A code this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Logical request sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Correlation key, unique per connection lifetime.
    pub request_id: RequestId,
    /// Session token, absent for unauthenticated actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Action family and operation with its payload.
    #[serde(flatten)]
    pub action: Action,
}

impl Request {
    /// Create a request.
    #[must_use]
    pub fn new(request_id: RequestId, session_id: Option<SessionId>, action: Action) -> Self {
        Self { request_id, session_id, action }
    }

    /// Serialize into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        serde_json::to_vec(self)
            .map(Frame::new)
            .map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }

    /// Parse a frame body as a request.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        serde_json::from_slice(frame.body()).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
    }
}

/// Server reply to exactly one [`Request`].
///
/// A failed response (`success == false`) carries a human-readable `message`
/// and no meaningful `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Correlation key of the originating request.
    pub request_id: RequestId,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome, always present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Operation-specific payload. Decode with [`Response::data_as`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    /// Successful response with a payload.
    pub fn success<T: Serialize>(
        request_id: RequestId,
        message: impl Into<String>,
        data: &T,
    ) -> Result<Self> {
        let data = serde_json::to_value(data).map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;
        Ok(Self {
            request_id,
            success: true,
            message: Some(message.into()),
            error_code: None,
            data: Some(data),
        })
    }

    /// Successful response without a payload.
    #[must_use]
    pub fn ok(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: true,
            message: Some(message.into()),
            error_code: None,
            data: None,
        }
    }

    /// Failed response carrying a message.
    #[must_use]
    pub fn failure(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            message: Some(message.into()),
            error_code: None,
            data: None,
        }
    }

    /// Attach a machine-readable error code.
    #[must_use]
    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Whether the server rejected the attached session token.
    #[must_use]
    pub fn is_session_invalid(&self) -> bool {
        !self.success && self.error_code == Some(ErrorCode::SessionInvalid)
    }

    /// Failure message, or a placeholder if the server omitted it.
    #[must_use]
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("request failed")
    }

    /// Decode `data` as the payload shape `T`.
    ///
    /// `expected` names the shape in error messages.
    pub fn data_as<T: DeserializeOwned>(&self, expected: &'static str) -> Result<T> {
        let data = self.data.as_ref().ok_or(ProtocolError::MissingData { expected })?;
        T::deserialize(data)
            .map_err(|e| ProtocolError::InvalidData { expected, reason: e.to_string() })
    }

    /// Serialize into a frame.
    pub fn to_frame(&self) -> Result<Frame> {
        serde_json::to_vec(self)
            .map(Frame::new)
            .map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }

    /// Parse a frame body as a response.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        serde_json::from_slice(frame.body()).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
    }
}
