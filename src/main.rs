//! chat-relay: A line-based TCP chat relay
//!
//! Every connected client gets a generated display name, and each line it
//! sends is relayed to all other connected clients as `<name>: <line>`.
//!
//! In-band commands:
//! - `@list`: names of everyone connected, in join order
//! - `@quit`: say goodbye and close the connection
//!
//! Configuration via CLI arguments, the `PORT` environment variable or a
//! TOML file.

mod commands;
mod config;
mod connection;
mod names;
mod registry;
mod server;
mod session;

use config::Config;
use names::RandomNames;
use server::Server;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!("{e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_level);

    info!(
        address = %config.listen_addr(),
        max_connections = config.max_connections,
        workers = ?config.workers,
        "Starting chat-relay"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(serve(config))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Run until interrupted, then stop accepting connections
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::new(config, Arc::new(RandomNames));
    let running = server.start().await?;

    tokio::signal::ctrl_c().await?;
    running.stop().await;
    Ok(())
}
