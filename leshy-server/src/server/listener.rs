use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::server::session;
use crate::types::SharedBroadcaster;

pub async fn start(
    addr: &str,
    broadcaster: SharedBroadcaster,
    config: Arc<BrokerConfig>,
    shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %listener.local_addr()?, "server listening");
    serve(listener, broadcaster, config, shutdown_rx).await
}

/// Accept loop: one task per connection, all sharing the shutdown signal.
pub async fn serve(
    listener: TcpListener,
    broadcaster: SharedBroadcaster,
    config: Arc<BrokerConfig>,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted.context("accepting connection")?;
                debug!(%peer, "new incoming connection");

                let broadcaster = broadcaster.clone();
                let config = config.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    if let Err(e) = session::handle_connection(socket, broadcaster, config, shutdown).await {
                        warn!(error = %e, %peer, "connection closed with error");
                    }
                });
            }

            _ = shutdown_rx.changed() => {
                info!("accept loop shutting down");
                return Ok(());
            }
        }
    }
}
