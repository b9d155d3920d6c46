//! Scriptable in-memory transport.
//!
//! [`MockTransport`] records every request the session layer sends and lets a
//! test decide when, in which order, and whether responses arrive. Clones
//! share state, so a test keeps one clone for inspection and hands the other
//! to the layer.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use consultoria_client::{Transport, TransportError, TransportEvent};
use consultoria_proto::{Frame, Request, Response};
use tokio::sync::{Notify, mpsc};

/// Reply hook consulted for every sent request. `None` leaves the request
/// unanswered.
type Responder = Box<dyn FnMut(&Request) -> Option<Response> + Send>;

#[derive(Default)]
struct MockState {
    connected: bool,
    events: Option<mpsc::Sender<TransportEvent>>,
    connect_calls: usize,
    send_calls: usize,
    sent: Vec<Request>,
    fail_connect: bool,
    responder: Option<Responder>,
}

/// In-memory [`Transport`] for session-layer tests.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    sent_notify: Arc<Notify>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("connected", &state.connected)
            .field("connect_calls", &state.connect_calls)
            .field("send_calls", &state.send_calls)
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Disconnected transport with no responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answering each request with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&Request) -> Option<Response> + Send + 'static,
    {
        let transport = Self::new();
        transport.set_responder(responder);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the reply hook.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&Request) -> Option<Response> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Number of `connect` calls so far.
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Number of `send_raw` calls so far.
    pub fn send_calls(&self) -> usize {
        self.lock().send_calls
    }

    /// Every request sent while connected, in send order.
    pub fn sent_requests(&self) -> Vec<Request> {
        self.lock().sent.clone()
    }

    /// Wait until at least `count` requests were sent.
    pub async fn wait_for_requests(&self, count: usize) -> Vec<Request> {
        loop {
            let notified = self.sent_notify.notified();
            {
                let state = self.lock();
                if state.sent.len() >= count {
                    return state.sent.clone();
                }
            }
            notified.await;
        }
    }

    /// Deliver `response` as if the server had sent it.
    ///
    /// Returns `false` if there is no live receive path.
    pub async fn respond(&self, response: &Response) -> bool {
        match response.to_frame() {
            Ok(frame) => self.push_frame(frame).await,
            Err(e) => {
                tracing::warn!(error = %e, "mock response not encodable");
                false
            },
        }
    }

    /// Deliver a raw frame as if the server had sent it.
    pub async fn push_frame(&self, frame: Frame) -> bool {
        self.push(TransportEvent::Frame(frame)).await
    }

    /// Drop the connection as if the peer had closed it.
    pub async fn close(&self, reason: &str) {
        let events = {
            let mut state = self.lock();
            state.connected = false;
            state.events.take()
        };
        if let Some(events) = events {
            let _ = events.send(TransportEvent::Closed { reason: reason.to_string() }).await;
        }
    }

    async fn push(&self, event: TransportEvent) -> bool {
        let events = self.lock().events.clone();
        match events {
            Some(events) => events.send(event).await.is_ok(),
            None => false,
        }
    }
}

impl Transport for MockTransport {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connect_calls += 1;
        if state.fail_connect {
            return Err(TransportError::Connect("connection refused".into()));
        }
        if !state.connected {
            state.connected = true;
            state.events = Some(events);
        }
        Ok(())
    }

    async fn send_raw(&self, frame: Frame) -> Result<(), TransportError> {
        let (reply, events) = {
            let mut state = self.lock();
            state.send_calls += 1;
            if !state.connected {
                return Err(TransportError::NotConnected);
            }

            let request = Request::from_frame(&frame)
                .map_err(|e| TransportError::Io(format!("mock cannot parse request: {e}")))?;
            let reply = state.responder.as_mut().and_then(|respond| respond(&request));
            state.sent.push(request);
            (reply, state.events.clone())
        };
        self.sent_notify.notify_waiters();

        if let (Some(reply), Some(events)) = (reply, events) {
            if let Ok(frame) = reply.to_frame() {
                let _ = events.send(TransportEvent::Frame(frame)).await;
            }
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.events = None;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
