//! Consultoria server binary.
//!
//! # Usage
//!
//! ```bash
//! # Empty directory
//! consultoria-server --bind 0.0.0.0:5000
//!
//! # With demo accounts and projects
//! consultoria-server --bind 127.0.0.1:5000 --seed-demo
//! ```

use clap::Parser;
use consultoria_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Consultoria session protocol server
#[derive(Parser, Debug)]
#[command(name = "consultoria-server")]
#[command(about = "Consultoria marketplace session protocol server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "1024")]
    max_connections: usize,

    /// Seed demo accounts and projects
    #[arg(long)]
    seed_demo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Consultoria server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.seed_demo {
        tracing::warn!("Seeding demo accounts with well-known passwords");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        max_connections: args.max_connections,
        seed_demo: args.seed_demo,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
