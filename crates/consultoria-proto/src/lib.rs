//! Consultoria wire protocol.
//!
//! Everything that crosses the connection between a client and the
//! marketplace backend: the length-prefixed [`Frame`], the JSON
//! [`Request`]/[`Response`] envelopes, and the typed [`Action`] variants
//! carried inside requests.
//!
//! # Layers
//!
//! - [`Frame`]: `[length: u32 BE][body: length bytes]`. Owns reassembly of a
//!   byte stream into complete bodies.
//! - [`Request`] / [`Response`]: JSON envelopes correlated by [`RequestId`].
//! - [`Action`]: one tagged variant per (action family, operation) pair, each
//!   with a statically known payload shape.
//!
//! Response data stays as raw JSON inside the envelope until the caller asks
//! for a concrete shape with [`Response::data_as`], so a routing layer can
//! correlate responses without knowing every payload type.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod frame;
pub mod payloads;

pub use envelope::{ErrorCode, Request, RequestId, Response, SessionId};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use payloads::{Action, ActionFamily, auth::AuthAction, chat::ChatAction, profile::ProfileAction};
