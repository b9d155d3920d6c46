//! Client configuration.

use std::time::Duration;

/// Deadline for a single request when the caller does not pass one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Session layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    pub server_addr: String,
    /// Deadline for one connect attempt.
    pub connect_timeout: Duration,
    /// Default deadline for a request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Configuration for `server_addr` with default deadlines.
    #[must_use]
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self { server_addr: server_addr.into(), ..Self::default() }
    }

    /// Override the request deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the connect deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5000".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
