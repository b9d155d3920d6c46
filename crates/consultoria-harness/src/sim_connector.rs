//! Turmoil TCP connector for the client transport.

use std::{io, sync::Arc};

use consultoria_client::{
    ClientConfig, Connector, MemorySessionStore, SessionLayer, SessionStore, StreamTransport,
};
use turmoil::net::TcpStream;

use crate::SimEnv;

/// Session layer speaking over simulated TCP.
pub type SimLayer = SessionLayer<StreamTransport<SimConnector>, SimEnv>;

/// [`Connector`] dialing a turmoil host (`"server:5000"`).
#[derive(Debug, Clone)]
pub struct SimConnector {
    addr: String,
}

impl SimConnector {
    /// Connector for `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for SimConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(self.addr.as_str()).await
    }
}

/// Session layer for `config.server_addr` over simulated TCP, with an
/// in-memory session store.
///
/// Must be called from inside a turmoil host or client.
pub fn sim_layer(config: ClientConfig, seed: u64) -> Arc<SimLayer> {
    sim_layer_with_store(config, seed, Arc::new(MemorySessionStore::new()))
}

/// Like [`sim_layer`], persisting the session in `store`.
pub fn sim_layer_with_store(
    config: ClientConfig,
    seed: u64,
    store: Arc<dyn SessionStore>,
) -> Arc<SimLayer> {
    let transport = StreamTransport::new(SimConnector::new(config.server_addr.clone()));
    Arc::new(SessionLayer::new(transport, SimEnv::with_seed(seed), config, store))
}
