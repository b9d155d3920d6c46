//! Simulation server for testing with turmoil.
//!
//! Serves the real request handlers over turmoil TCP so client and server run
//! together under simulated time and network.

use std::{io, sync::Arc};

use consultoria_server::{Directory, Dispatcher, serve_connection};
use turmoil::net::TcpListener;

/// Port the simulated server listens on.
pub const SIM_PORT: u16 = 5000;

/// Simulated server host.
pub struct SimServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl SimServer {
    /// Bind on `address` (e.g. `"0.0.0.0:5000"`) serving `directory`.
    pub async fn bind(address: &str, directory: Directory) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, dispatcher: Arc::new(Dispatcher::new(directory)) })
    }

    /// Request handlers and the state behind them.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accept and serve connections forever.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, dispatcher).await {
                    tracing::debug!(%peer, error = %e, "simulated connection ended");
                }
            });
        }
    }
}

/// Register a turmoil host named `name` serving `directory` on [`SIM_PORT`].
///
/// The directory is cloned into every (re)start of the host, so its records
/// survive a bounce while live sessions do not.
pub fn host_server(sim: &mut turmoil::Sim<'_>, name: &str, directory: Directory) {
    sim.host(name, move || {
        let directory = directory.clone();
        async move {
            let server = SimServer::bind(&format!("0.0.0.0:{SIM_PORT}"), directory).await?;
            server.run().await?;
            Ok(())
        }
    });
}
