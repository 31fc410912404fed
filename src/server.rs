//! Accept loop
//!
//! Starts the hub actor and spawns one connection handler per accepted
//! TCP connection until the shutdown token fires.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::handler::handle_connection;
use crate::hub::HubHandle;

/// Serve chat clients on an already bound listener
///
/// Cancelling `shutdown` stops accepting, ends every session's read loop,
/// and stops the hub and all rooms.
pub async fn serve(listener: TcpListener, config: Arc<Config>, shutdown: CancellationToken) {
    let (hub, hub_task) = HubHandle::spawn(
        config.hub_mailbox_capacity,
        config.room_mailbox_capacity,
        shutdown.child_token(),
    );

    info!("Hub actor started");

    // Connection accept loop
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let hub = hub.clone();
                let config = Arc::clone(&config);
                let shutdown = shutdown.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, hub, &config, shutdown).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }

    hub.shutdown();
    let _ = hub_task.await;
    info!("Server stopped");
}
