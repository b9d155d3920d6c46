//! Request dispatch.
//!
//! [`Dispatcher::dispatch`] turns one decoded [`Request`] into exactly one
//! [`Response`] carrying the same request id. AUTH is open; PROFILE and CHAT
//! need a live session token and are refused with
//! [`ErrorCode::SessionInvalid`] otherwise.

mod auth;
mod chat;
mod profile;

use consultoria_proto::{
    Action, ErrorCode, ProtocolError, Request, RequestId, Response, SessionId,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    directory::{Directory, DirectoryError},
    error::ServerError,
    sessions::SessionManager,
};

/// Request id used when a request is too malformed to carry its own.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    code: ErrorCode,
    message: String,
}

impl Failure {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    fn into_response(self, request_id: RequestId) -> Response {
        Response::failure(request_id, self.message).with_error_code(self.code)
    }
}

impl From<DirectoryError> for Failure {
    fn from(err: DirectoryError) -> Self {
        let code = match err {
            DirectoryError::DuplicateEmail => ErrorCode::InvalidRequest,
            DirectoryError::UserNotFound(_) | DirectoryError::ProjectNotFound(_) => {
                ErrorCode::NotFound
            },
            DirectoryError::AccessDenied { .. } => ErrorCode::Forbidden,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ProtocolError> for Failure {
    fn from(err: ProtocolError) -> Self {
        error!(error = %err, "failed to encode response data");
        Self::new(ErrorCode::Internal, "internal server error")
    }
}

impl From<ServerError> for Failure {
    fn from(err: ServerError) -> Self {
        error!(error = %err, "request failed internally");
        Self::new(ErrorCode::Internal, "internal server error")
    }
}

type Outcome = Result<Response, Failure>;

/// Successful response carrying `data`.
fn reply<T: Serialize>(request_id: &RequestId, message: &str, data: &T) -> Outcome {
    Ok(Response::success(request_id.clone(), message, data)?)
}

/// Routes requests to the AUTH, PROFILE and CHAT handlers.
pub struct Dispatcher {
    directory: Directory,
    sessions: SessionManager,
}

impl Dispatcher {
    /// Dispatcher over `directory` with no live sessions.
    pub fn new(directory: Directory) -> Self {
        Self { directory, sessions: SessionManager::new() }
    }

    /// Account, project and message records.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Live session tokens.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one request.
    pub fn dispatch(&self, request: Request) -> Response {
        let Request { request_id, session_id, action } = request;
        let family = action.family();
        let operation = action.operation();

        let outcome = match action {
            Action::Auth(action) => auth::handle(self, &request_id, session_id.as_ref(), action),
            Action::Profile(action) => self
                .authorize(session_id.as_ref())
                .and_then(|user_id| profile::handle(self, &request_id, user_id, action)),
            Action::Chat(action) => self
                .authorize(session_id.as_ref())
                .and_then(|user_id| chat::handle(self, &request_id, user_id, action)),
        };

        match outcome {
            Ok(response) => {
                debug!(request_id = %request_id, %family, operation, "request handled");
                response
            },
            Err(failure) => {
                debug!(
                    request_id = %request_id,
                    %family,
                    operation,
                    code = ?failure.code,
                    message = %failure.message,
                    "request refused"
                );
                failure.into_response(request_id)
            },
        }
    }

    fn authorize(&self, session_id: Option<&SessionId>) -> Result<u64, Failure> {
        session_id
            .and_then(|id| self.sessions.validate(id))
            .ok_or_else(|| Failure::new(ErrorCode::SessionInvalid, "invalid or expired session"))
    }
}

/// Response to a frame whose body is not a valid request.
///
/// Echoes the request id if one can be found, otherwise
/// [`UNKNOWN_REQUEST_ID`]. Unsupported families and operations are reported as
/// [`ErrorCode::UnknownAction`].
pub fn reject_malformed(body: &[u8], err: &ProtocolError) -> Response {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Failure::invalid("invalid message format")
            .into_response(RequestId::new(UNKNOWN_REQUEST_ID));
    };

    let request_id = value
        .get("requestId")
        .and_then(Value::as_str)
        .map_or_else(|| RequestId::new(UNKNOWN_REQUEST_ID), RequestId::new);

    let family = value.get("type").and_then(Value::as_str);
    let operation = value.pointer("/data/action").and_then(Value::as_str);

    let failure = match (family, operation) {
        (Some(family), _) if !matches!(family, "AUTH" | "PROFILE" | "CHAT") => {
            Failure::new(ErrorCode::UnknownAction, format!("Unknown message type: {family}"))
        },
        (Some(family), Some(operation)) if !is_known_operation(family, operation) => {
            Failure::new(ErrorCode::UnknownAction, format!("Unknown action: {operation}"))
        },
        _ => Failure::invalid(format!("invalid request: {err}")),
    };
    failure.into_response(request_id)
}

fn is_known_operation(family: &str, operation: &str) -> bool {
    match family {
        "AUTH" => matches!(operation, "LOGIN" | "REGISTER" | "LOGOUT"),
        "PROFILE" => matches!(operation, "UPDATE" | "UPLOAD_PHOTO" | "GET"),
        "CHAT" => matches!(operation, "SEND" | "GET_MESSAGES" | "GET_PROJECTS_WITH_CHAT"),
        _ => false,
    }
}
