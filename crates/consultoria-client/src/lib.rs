//! Consultoria client.
//!
//! Talks to the marketplace backend over one persistent connection carrying
//! correlated request/response envelopes.
//!
//! # Layers
//!
//! - [`transport`]: ordered byte channel with frame reassembly.
//! - [`session`]: correlation of responses to requests, connection lifecycle
//!   and ownership of the session token.
//! - [`services`]: typed AUTH, PROFILE and CHAT calls.
//! - [`polling`]: cancellable chat re-fetch that reports count changes.
//!
//! Time and randomness come from an [`Environment`], the persisted session
//! record from a [`SessionStore`], so every layer runs unchanged under
//! deterministic simulation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use consultoria_client::{
//!     AuthService, ChatService, ClientConfig, MemorySessionStore, SessionLayer, StreamTransport,
//!     SystemEnv,
//! };
//!
//! # async fn demo() -> Result<(), consultoria_client::SessionError> {
//! let config = ClientConfig::new("127.0.0.1:5000");
//! let transport = StreamTransport::tcp(config.server_addr.clone());
//! let layer = Arc::new(SessionLayer::new(
//!     transport,
//!     SystemEnv::new(),
//!     config,
//!     Arc::new(MemorySessionStore::new()),
//! ));
//!
//! let auth = AuthService::new(Arc::clone(&layer));
//! let session = auth.login("ana@x.com", "pw123456").await?;
//!
//! let chat = ChatService::new(layer);
//! chat.send_message(7, session.user.user_id, "oi").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod pending;
pub mod polling;
pub mod services;
pub mod session;
pub mod store;
pub mod transport;

pub use config::ClientConfig;
pub use env::{Environment, SystemEnv};
pub use error::{SessionError, TransportError};
pub use polling::{MessageFeed, PollConfig, PollHandle, start_polling};
pub use services::{AuthService, ChatService, ProfileService};
pub use session::{ConnectionState, SessionLayer};
pub use store::{
    AuthSession, FileSessionStore, MemorySessionStore, SessionStore, StoreError, UserIdentity,
};
pub use transport::{Connector, StreamTransport, TcpConnector, Transport, TransportEvent};
