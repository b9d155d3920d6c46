//! Consultoria development server.
//!
//! Speaks the length-prefixed JSON session protocol of [`consultoria_proto`]
//! over TCP and keeps accounts, projects and chat messages in memory.
//!
//! # Components
//!
//! - [`Server`]: accept loop, one task per connection
//! - [`serve_connection`]: request/response loop over any byte stream
//! - [`Dispatcher`]: routes AUTH, PROFILE and CHAT requests
//! - [`Directory`]: account, project and message records
//! - [`SessionManager`]: live session tokens

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
mod error;
mod handlers;
mod sessions;

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use consultoria_proto::{ErrorCode, Frame, Request, Response};
pub use directory::{Directory, DirectoryError, NewUser, Project, ProjectStatus, User};
pub use error::ServerError;
pub use handlers::{Dispatcher, UNKNOWN_REQUEST_ID, reject_malformed};
pub use sessions::SessionManager;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::Semaphore,
};

/// Initial read buffer per connection.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:5000")
    pub bind_address: String,
    /// Connections served at once; further ones are closed on accept
    pub max_connections: usize,
    /// Start with the demo accounts and projects of
    /// [`Directory::with_demo_data`]
    pub seed_demo: bool,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:5000".to_string(), max_connections: 1024, seed_demo: false }
    }
}

/// TCP server.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    limit: Arc<Semaphore>,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".into()));
        }

        let directory =
            if config.seed_demo { Directory::with_demo_data() } else { Directory::new() };
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("cannot bind {}: {e}", config.bind_address))
        })?;

        Ok(Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(directory)),
            limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Run the server, accepting connections and serving their requests.
    ///
    /// This method runs until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    continue;
                },
            };

            let Ok(permit) = Arc::clone(&self.limit).try_acquire_owned() else {
                tracing::warn!(%peer, "connection limit reached, closing");
                continue;
            };
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection accepted");
                if let Err(e) = serve_connection(stream, dispatcher).await {
                    tracing::error!("Connection error: {}", e);
                }
                tracing::debug!(%peer, "connection closed");
                drop(permit);
            });
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Request handlers and the state behind them.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

/// Serve requests arriving on `stream` until the peer closes it.
///
/// Requests are answered one at a time in arrival order, each with exactly
/// one response. A frame whose body is not a valid request gets a failure
/// response; a frame that cannot be delimited ends the connection.
///
/// # Errors
///
/// [`ServerError::Protocol`] on an invalid length prefix,
/// [`ServerError::Transport`] on I/O failure.
pub async fn serve_connection<S>(
    mut stream: S,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut inbound = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut outbound = BytesMut::new();

    loop {
        while let Some(frame) = Frame::decode(&mut inbound)? {
            let response = match Request::from_frame(&frame) {
                Ok(request) => dispatcher.dispatch(request),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed request");
                    reject_malformed(frame.body(), &e)
                },
            };

            encode_response(&response, &mut outbound)?;
            stream.write_all(&outbound).await?;
            outbound.clear();
        }

        if stream.read_buf(&mut inbound).await? == 0 {
            if !inbound.is_empty() {
                tracing::debug!(buffered = inbound.len(), "peer closed mid-frame");
            }
            return Ok(());
        }
    }
}

/// Frame `response` into `dst`, substituting an internal-error failure if the
/// response itself cannot be framed.
fn encode_response(response: &Response, dst: &mut BytesMut) -> Result<(), ServerError> {
    let Err(e) = response.to_frame().and_then(|frame| frame.encode(dst)) else {
        return Ok(());
    };

    tracing::error!(request_id = %response.request_id, error = %e, "cannot encode response");
    dst.clear();
    Response::failure(response.request_id.clone(), "internal server error")
        .with_error_code(ErrorCode::Internal)
        .to_frame()
        .and_then(|frame| frame.encode(dst))
        .map_err(|e| ServerError::Internal(format!("cannot encode failure response: {e}")))
}
