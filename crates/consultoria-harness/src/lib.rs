//! Deterministic simulation harness for the Consultoria session protocol.
//!
//! - [`MockTransport`]: scriptable in-memory transport; tests decide when and
//!   in which order responses arrive
//! - [`SimEnv`]: seeded randomness over tokio's (virtual) clock
//! - [`SimConnector`] and [`SimServer`]: the real client transport and the real
//!   server handlers over turmoil's simulated TCP

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod mock_transport;
pub mod sim_connector;
pub mod sim_env;
pub mod sim_server;

pub use mock_transport::MockTransport;
pub use sim_connector::{SimConnector, SimLayer, sim_layer, sim_layer_with_store};
pub use sim_env::{SIM_EPOCH_SECS, SimEnv};
pub use sim_server::{SIM_PORT, SimServer, host_server};
