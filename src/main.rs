//! Chat Hub Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and runs the accept loop
//! until Ctrl-C.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_hub::{serve, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let mut config = Config::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.bind_address = addr;
    }

    // Start TCP listener
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Chat server listening on {}", config.bind_address);

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, Arc::new(config), shutdown.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    shutdown.cancel();
    server.await?;

    Ok(())
}
