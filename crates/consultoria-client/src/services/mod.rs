//! Typed action services.
//!
//! Each service maps typed calls onto [`SessionLayer::send`] for one action
//! family and interprets the reply. Services never touch the pending table or
//! the session record directly; they go through the layer.
//!
//! [`SessionLayer::send`]: crate::session::SessionLayer::send

pub mod auth;
pub mod chat;
pub mod profile;

use consultoria_proto::Response;
use serde::de::DeserializeOwned;

pub use self::{auth::AuthService, chat::ChatService, profile::ProfileService};
use crate::error::SessionError;

/// Turn a `success = false` reply into [`SessionError::Rejected`].
fn accepted(response: Response) -> Result<Response, SessionError> {
    if response.success {
        Ok(response)
    } else {
        Err(SessionError::Rejected { message: response.message_or_default().to_string() })
    }
}

/// Accept the reply and decode its payload.
fn decode<T: DeserializeOwned>(
    response: Response,
    expected: &'static str,
) -> Result<T, SessionError> {
    Ok(accepted(response)?.data_as(expected)?)
}
