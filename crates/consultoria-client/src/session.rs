//! Session protocol layer.
//!
//! Turns a typed [`Action`] into a correlated request/response exchange over
//! a [`Transport`], and owns the session token attached to authenticated
//! requests.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected --send()--> Connecting --ok--> Connected
//!      ^                        |                 |
//!      +-------- failure -------+---- drop / disconnect()
//! ```
//!
//! Every connect attempt starts a new *generation*. Pending requests are
//! tagged with the generation they were sent on, and a dispatch task per
//! generation resolves them. When a generation ends, exactly its pending
//! requests fail with [`SessionError::Connection`]. There is no automatic
//! reconnect: the next `send()` connects again, once.
//!
//! # Delivery
//!
//! At most once. A request is written at most one time; if its connection
//! drops before the response arrives the caller gets a connection error and
//! decides whether to retry.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use consultoria_proto::{
    Action, Frame, ProtocolError, Request, RequestId, Response, SessionId, frame::MAX_FRAME_SIZE,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    env::Environment,
    error::SessionError,
    pending::PendingTable,
    store::{AuthSession, SessionStore, UserIdentity},
    transport::{Transport, TransportEvent},
};

/// Inbound event queue depth per connection.
const EVENT_QUEUE: usize = 64;

/// Connection state as seen by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. The next `send()` connects.
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Requests can be sent.
    Connected,
}

/// Connection state and in-flight requests, guarded together so a request is
/// never registered against a connection that is already gone.
struct Correlation {
    state: ConnectionState,
    generation: u64,
    pending: PendingTable,
}

/// State shared with the dispatch tasks.
struct Shared {
    correlation: Mutex<Correlation>,
    discarded_frames: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Correlation> {
        self.correlation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one inbound frame to its waiting caller. Never fails.
    fn deliver(&self, frame: &Frame) {
        let response = match Response::from_frame(frame) {
            Ok(response) => response,
            Err(e) => {
                self.discarded_frames.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "discarding undecodable frame");
                return;
            },
        };

        let waiter = self.lock().pending.resolve(&response.request_id);
        match waiter {
            Some(waiter) => {
                debug!(
                    request_id = %response.request_id,
                    success = response.success,
                    "response routed"
                );
                waiter.complete(Ok(response));
            },
            None => {
                self.discarded_frames.fetch_add(1, Ordering::Relaxed);
                warn!(request_id = %response.request_id, "discarding response for unknown request");
            },
        }
    }

    /// Fail every request sent on `generation`.
    fn connection_lost(&self, generation: u64, reason: &str) {
        let cancelled = {
            let mut correlation = self.lock();
            if correlation.generation == generation {
                correlation.state = ConnectionState::Disconnected;
            }
            correlation.pending.cancel_generation(generation)
        };

        if !cancelled.is_empty() {
            warn!(generation, cancelled = cancelled.len(), reason, "connection lost");
        }
        for waiter in cancelled {
            waiter.complete(Err(SessionError::Connection(reason.to_string())));
        }
    }
}

/// Receive path of one connection generation.
async fn dispatch(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    let reason = loop {
        match events.recv().await {
            Some(TransportEvent::Frame(frame)) => shared.deliver(&frame),
            Some(TransportEvent::Closed { reason }) => break reason,
            None => break "transport closed".to_string(),
        }
    };

    debug!(generation, reason = %reason, "dispatch finished");
    shared.connection_lost(generation, &reason);
}

/// Removes its pending entry when the caller stops waiting, whatever the
/// reason. A no-op once the entry was resolved or cancelled.
struct PendingGuard<'a> {
    shared: &'a Shared,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().pending.remove(&self.request_id);
    }
}

/// Correlated request/response over one persistent connection.
///
/// Shared by reference (typically in an `Arc`) between the action services
/// and the polling subsystem. All methods take `&self`.
pub struct SessionLayer<T: Transport, E: Environment> {
    transport: T,
    env: E,
    config: ClientConfig,
    store: Arc<dyn SessionStore>,
    shared: Arc<Shared>,
    connect_lock: tokio::sync::Mutex<()>,
    session: RwLock<Option<AuthSession>>,
    next_seq: AtomicU64,
    key_prefix: String,
}

impl<T: Transport, E: Environment> SessionLayer<T, E> {
    /// Create a disconnected layer.
    ///
    /// A session found in `store` is resumed. An unreadable store is logged
    /// and treated as empty.
    pub fn new(transport: T, env: E, config: ClientConfig, store: Arc<dyn SessionStore>) -> Self {
        let session = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session record");
                None
            },
        };
        if let Some(session) = &session {
            info!(
                session = session.session_id.short(),
                user_id = session.user.user_id,
                "resuming session"
            );
        }

        let key_prefix = format!("{:016x}", env.random_u64());

        Self {
            transport,
            env,
            config,
            store,
            shared: Arc::new(Shared {
                correlation: Mutex::new(Correlation {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    pending: PendingTable::new(),
                }),
                discarded_frames: AtomicU64::new(0),
            }),
            connect_lock: tokio::sync::Mutex::new(()),
            session: RwLock::new(session),
            next_seq: AtomicU64::new(0),
            key_prefix,
        }
    }

    /// Send an action with the configured request deadline.
    pub async fn send(&self, action: Action) -> Result<Response, SessionError> {
        self.send_with_timeout(action, self.config.request_timeout).await
    }

    /// Send an action and wait for its correlated response.
    ///
    /// Connects first if needed. The current session token is attached
    /// unless the action creates a session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Connection`] if connecting or writing fails, or the
    ///   connection drops before the response arrives
    /// - [`SessionError::Timeout`] if the request cannot be queued and answered
    ///   within `timeout`; a frame still queued when it expires is never
    ///   written
    /// - [`SessionError::NotAuthenticated`] if the server rejected the session
    ///   token; the session has been discarded
    /// - [`SessionError::Protocol`] if the request cannot be encoded
    pub async fn send_with_timeout(
        &self,
        action: Action,
        timeout: Duration,
    ) -> Result<Response, SessionError> {
        let session_id = if action.attaches_session() { self.session_id() } else { None };
        let family = action.family();
        let operation = action.operation();

        let generation = self.ensure_connected().await?;

        let request_id = self.next_request_id();
        let frame = Request::new(request_id.clone(), session_id.clone(), action).to_frame()?;
        if frame.body().len() > MAX_FRAME_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.body().len(),
                max: MAX_FRAME_SIZE as usize,
            }
            .into());
        }

        let response_rx = {
            let mut correlation = self.shared.lock();
            if correlation.state != ConnectionState::Connected
                || correlation.generation != generation
            {
                return Err(SessionError::Connection("connection closed before send".to_string()));
            }
            correlation.pending.register(request_id.clone(), generation)
        };
        let Some(response_rx) = response_rx else {
            debug_assert!(false, "correlation keys are never reused");
            return Err(SessionError::Connection("correlation key already in flight".to_string()));
        };
        let _guard = PendingGuard { shared: &self.shared, request_id: request_id.clone() };

        debug!(request_id = %request_id, %family, operation, "sending request");
        let started = self.env.now();

        // One deadline covers queueing the frame and waiting for the reply.
        let deadline = self.env.sleep(timeout);
        tokio::pin!(deadline);
        let timed_out = || {
            warn!(request_id = %request_id, %family, operation, ?timeout, "request timed out");
            SessionError::Timeout { elapsed: timeout }
        };

        tokio::select! {
            sent = self.transport.send_raw(frame) => sent?,
            () = &mut deadline => return Err(timed_out()),
        }

        let response = tokio::select! {
            outcome = response_rx => outcome.unwrap_or_else(|_| {
                Err(SessionError::Connection("request abandoned".to_string()))
            }),
            () = &mut deadline => Err(timed_out()),
        }?;

        debug!(
            request_id = %request_id,
            elapsed = ?(self.env.now() - started),
            success = response.success,
            "request completed"
        );

        if response.is_session_invalid() {
            warn!(%family, operation, "server rejected session token");
            self.invalidate(session_id.as_ref())?;
            return Err(SessionError::NotAuthenticated);
        }

        Ok(response)
    }

    /// Make sure a connection is up, returning its generation.
    async fn ensure_connected(&self) -> Result<u64, SessionError> {
        if let Some(generation) = self.live_generation() {
            return Ok(generation);
        }

        let _connecting = self.connect_lock.lock().await;
        if let Some(generation) = self.live_generation() {
            return Ok(generation);
        }

        let generation = {
            let mut correlation = self.shared.lock();
            correlation.state = ConnectionState::Connecting;
            correlation.generation += 1;
            correlation.generation
        };

        if self.transport.is_connected() {
            // The layer lost track of a live channel; start from a clean one.
            self.transport.disconnect().await;
        }

        info!(addr = %self.config.server_addr, generation, "connecting");
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let connect_timeout = self.config.connect_timeout;
        let result = tokio::select! {
            result = self.transport.connect(events_tx) => result.map_err(SessionError::from),
            () = self.env.sleep(connect_timeout) => Err(SessionError::Connection(format!(
                "connect timed out after {connect_timeout:?}"
            ))),
        };

        let superseded = {
            let mut correlation = self.shared.lock();
            let current = correlation.generation == generation;
            if current {
                correlation.state = if result.is_ok() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                };
            }
            !current
        };

        match result {
            Ok(()) if superseded => {
                self.transport.disconnect().await;
                Err(SessionError::Connection("disconnected while connecting".to_string()))
            },
            Ok(()) => {
                tokio::spawn(dispatch(Arc::clone(&self.shared), generation, events_rx));
                info!(generation, "connected");
                Ok(generation)
            },
            Err(e) => {
                warn!(error = %e, generation, "connect failed");
                Err(e)
            },
        }
    }

    fn live_generation(&self) -> Option<u64> {
        let correlation = self.shared.lock();
        (correlation.state == ConnectionState::Connected && self.transport.is_connected())
            .then_some(correlation.generation)
    }

    fn next_request_id(&self) -> RequestId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("{}-{seq}", self.key_prefix))
    }

    /// Close the connection and fail every pending request. Idempotent.
    ///
    /// The session itself is kept; the next `send()` reconnects with it.
    pub async fn disconnect(&self) {
        let cancelled = {
            let mut correlation = self.shared.lock();
            correlation.state = ConnectionState::Disconnected;
            correlation.generation += 1;
            correlation.pending.cancel_all()
        };

        let count = cancelled.len();
        for waiter in cancelled {
            waiter.complete(Err(SessionError::Connection("connection closed".to_string())));
        }

        self.transport.disconnect().await;
        info!(cancelled = count, "disconnected");
    }

    /// Record a session returned by a successful AUTH operation.
    ///
    /// The record is persisted before it becomes visible to callers.
    pub fn establish_session(
        &self,
        session_id: SessionId,
        user: UserIdentity,
    ) -> Result<AuthSession, SessionError> {
        let authenticated_at = self.env.wall_clock_secs();
        let session = AuthSession { session_id, user, authenticated_at };
        self.store.save(&session)?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());

        info!(
            session = session.session_id.short(),
            user_id = session.user.user_id,
            "session established"
        );
        Ok(session)
    }

    /// Forget the current session, in memory and in the store.
    ///
    /// The in-memory session is gone even if clearing the store fails.
    pub fn discard_session(&self) -> Result<(), SessionError> {
        let previous = self.session.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(previous) = previous {
            info!(session = previous.session_id.short(), "session discarded");
        }
        self.store.clear()?;
        Ok(())
    }

    /// Discard the session if it is still the one the server rejected.
    fn invalidate(&self, rejected: Option<&SessionId>) -> Result<(), SessionError> {
        let still_current = rejected.is_some_and(|rejected| {
            self.session
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(|current| &current.session_id == rejected)
        });

        if still_current { self.discard_session() } else { Ok(()) }
    }

    /// Snapshot of the current session.
    pub fn current_session(&self) -> Option<AuthSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current session token.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.session_id.clone())
    }

    /// Connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Inbound frames dropped because they were undecodable or unmatched.
    pub fn discarded_frames(&self) -> u64 {
        self.shared.discarded_frames.load(Ordering::Relaxed)
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
