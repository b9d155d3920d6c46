//! Transport connection.
//!
//! A [`Transport`] owns one persistent, ordered byte channel to a single
//! endpoint. It knows nothing about envelopes: outbound it takes complete
//! [`Frame`]s, inbound it reassembles the byte stream and hands complete frames
//! to the session layer through a [`TransportEvent`] channel, in arrival
//! order.
//!
//! [`StreamTransport`] implements it over anything that can produce an
//! `AsyncRead + AsyncWrite` stream, so the same code runs over TCP in
//! production and over in-memory or simulated streams in tests.

use std::{
    future::Future,
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::{Bytes, BytesMut};
use consultoria_proto::Frame;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::mpsc,
    task::AbortHandle,
};
use tracing::debug;

use crate::error::TransportError;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 64;

/// Read buffer reserved per read call.
const READ_CHUNK: usize = 8 * 1024;

/// Something the receive path reports to the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound frame.
    Frame(Frame),
    /// The channel is gone. No further events follow.
    Closed {
        /// Human-readable cause
        reason: String,
    },
}

/// Persistent, ordered, bidirectional frame channel.
pub trait Transport: Send + Sync + 'static {
    /// Open the channel, delivering inbound events to `events`.
    ///
    /// Idempotent: if already connected this returns immediately and `events`
    /// is dropped; the existing receive path keeps its own sender.
    fn connect(
        &self,
        events: mpsc::Sender<TransportEvent>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Enqueue a frame for transmission.
    ///
    /// Frames are written in the order `send_raw` calls enqueue them. A frame
    /// that cannot be encoded is refused with [`TransportError::Encode`] and
    /// nothing is queued.
    fn send_raw(&self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the channel. Idempotent.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Whether the channel is currently open.
    fn is_connected(&self) -> bool;
}

/// Produces fresh byte streams to the server.
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open one stream.
    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// TCP connector for production use.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Connector for `addr` (`host:port`).
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// One live stream: the outbound queue plus its I/O tasks.
struct Link {
    outbound: mpsc::Sender<Bytes>,
    alive: Arc<AtomicBool>,
    reader: AbortHandle,
    writer: AbortHandle,
}

impl Link {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn abort(&self) {
        self.alive.store(false, Ordering::Release);
        self.reader.abort();
        self.writer.abort();
    }
}

/// [`Transport`] over a stream produced by a [`Connector`].
///
/// Each connection spawns a writer task that drains a FIFO queue and a reader
/// task that reassembles frames. Either task failing marks the link dead and
/// reports [`TransportEvent::Closed`] once.
pub struct StreamTransport<C: Connector> {
    connector: C,
    link: Mutex<Option<Link>>,
}

impl<C: Connector> StreamTransport<C> {
    /// Create a disconnected transport.
    pub fn new(connector: C) -> Self {
        Self { connector, link: Mutex::new(None) }
    }

    fn outbound(&self) -> Option<mpsc::Sender<Bytes>> {
        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        link.as_ref().filter(|link| link.is_alive()).map(|link| link.outbound.clone())
    }
}

impl StreamTransport<TcpConnector> {
    /// TCP transport to `addr`.
    #[must_use]
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(TcpConnector::new(addr))
    }
}

impl<C: Connector> Transport for StreamTransport<C> {
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }

        let stream =
            self.connector.connect().await.map_err(|e| TransportError::Connect(e.to_string()))?;
        let (read_half, write_half) = tokio::io::split(stream);

        let alive = Arc::new(AtomicBool::new(true));
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

        let writer =
            tokio::spawn(write_loop(write_half, outbound_rx, Arc::clone(&alive), events.clone()));
        let reader = tokio::spawn(read_loop(read_half, events, Arc::clone(&alive)));

        let new_link = Link {
            outbound: outbound_tx,
            alive,
            reader: reader.abort_handle(),
            writer: writer.abort_handle(),
        };

        let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = link.replace(new_link) {
            old.abort();
        }

        debug!("transport connected");
        Ok(())
    }

    async fn send_raw(&self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound().ok_or(TransportError::NotConnected)?;

        let mut wire = BytesMut::new();
        frame.encode(&mut wire)?;
        outbound.send(wire.freeze()).await.map_err(|_| TransportError::NotConnected)
    }

    async fn disconnect(&self) {
        let old = self.link.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(old) = old {
            old.abort();
            debug!("transport disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        link.as_ref().is_some_and(Link::is_alive)
    }
}

impl<C: Connector> Drop for StreamTransport<C> {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            link.abort();
        }
    }
}

/// Report closure exactly once per link.
async fn close(alive: &AtomicBool, events: &mpsc::Sender<TransportEvent>, reason: String) {
    if alive.swap(false, Ordering::AcqRel) {
        let _ = events.send(TransportEvent::Closed { reason }).await;
    }
}

async fn write_loop<S: AsyncWrite>(
    mut stream: WriteHalf<S>,
    mut outbound: mpsc::Receiver<Bytes>,
    alive: Arc<AtomicBool>,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some(wire) = outbound.recv().await {
        if let Err(e) = stream.write_all(&wire).await {
            close(&alive, &events, format!("write failed: {e}")).await;
            return;
        }
        debug!(bytes = wire.len(), "frame written");
    }
}

async fn read_loop<S: AsyncRead>(
    mut stream: ReadHalf<S>,
    events: mpsc::Sender<TransportEvent>,
    alive: Arc<AtomicBool>,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    let reason = loop {
        loop {
            match Frame::decode(&mut buf) {
                Ok(Some(frame)) => {
                    if events.send(TransportEvent::Frame(frame)).await.is_err() {
                        // Nobody is listening any more.
                        alive.store(false, Ordering::Release);
                        return;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    close(&alive, &events, format!("framing error: {e}")).await;
                    return;
                },
            }
        }

        buf.reserve(READ_CHUNK);
        match stream.read_buf(&mut buf).await {
            Ok(0) => break "connection closed by peer".to_string(),
            Ok(_) => {},
            Err(e) => break format!("read failed: {e}"),
        }
    };

    close(&alive, &events, reason).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_utils {
    use std::{
        collections::VecDeque,
        io,
        sync::{Arc, Mutex},
    };

    use bytes::BytesMut;
    use consultoria_proto::{Frame, Request, Response};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt, DuplexStream},
        sync::{Notify, mpsc},
        task::JoinHandle,
    };

    use super::Connector;

    /// Hands out pre-made in-memory streams, one per connect, then refuses.
    pub(crate) struct DuplexConnector {
        streams: Mutex<VecDeque<DuplexStream>>,
    }

    impl DuplexConnector {
        pub(crate) fn new(streams: Vec<DuplexStream>) -> Self {
            Self { streams: Mutex::new(streams.into()) }
        }
    }

    impl Connector for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> io::Result<DuplexStream> {
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    /// Holds its single stream back until the gate is opened.
    pub(crate) struct GatedConnector {
        gate: Arc<Notify>,
        stream: Mutex<Option<DuplexStream>>,
    }

    impl GatedConnector {
        pub(crate) fn new(stream: DuplexStream) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            (Self { gate: Arc::clone(&gate), stream: Mutex::new(Some(stream)) }, gate)
        }
    }

    impl Connector for GatedConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> io::Result<DuplexStream> {
            self.gate.notified().await;
            self.stream
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    /// Server end of a duplex stream speaking the envelope protocol.
    pub(crate) struct Peer {
        requests: mpsc::UnboundedReceiver<Request>,
        replies: mpsc::UnboundedSender<Frame>,
        tasks: [JoinHandle<()>; 2],
    }

    impl Peer {
        pub(crate) fn spawn(stream: DuplexStream) -> Self {
            let (mut read, mut write) = tokio::io::split(stream);
            let (request_tx, requests) = mpsc::unbounded_channel();
            let (replies, mut reply_rx) = mpsc::unbounded_channel::<Frame>();

            let reader = tokio::spawn(async move {
                let mut buf = BytesMut::new();
                loop {
                    while let Some(frame) = Frame::decode(&mut buf).unwrap() {
                        let _ = request_tx.send(Request::from_frame(&frame).unwrap());
                    }
                    if read.read_buf(&mut buf).await.unwrap_or(0) == 0 {
                        break;
                    }
                }
            });

            let writer = tokio::spawn(async move {
                while let Some(frame) = reply_rx.recv().await {
                    let mut out = Vec::new();
                    frame.encode(&mut out).unwrap();
                    if write.write_all(&out).await.is_err() {
                        break;
                    }
                }
            });

            Self { requests, replies, tasks: [reader, writer] }
        }

        pub(crate) async fn next_request(&mut self) -> Request {
            self.requests.recv().await.unwrap()
        }

        pub(crate) fn reply(&self, response: &Response) {
            self.replies.send(response.to_frame().unwrap()).unwrap();
        }

        pub(crate) fn send_raw(&self, frame: Frame) {
            self.replies.send(frame).unwrap();
        }

        /// Close the server end of the stream.
        pub(crate) fn hang_up(self) {
            for task in &self.tasks {
                task.abort();
            }
        }
    }
}
