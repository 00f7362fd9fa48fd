use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use leshy_server::config::BrokerConfig;
use leshy_server::core::broadcaster::MessageBroadcaster;
use leshy_server::core::pool::ConnectionMap;
use leshy_server::core::storage::DistributedSqlStorage;
use leshy_server::server::Params;
use leshy_server::types::SharedBroadcaster;
use leshy_server::{runtime, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_thread_ids(true)
        .compact()
        .init();

    let params = Params::parse();
    let config = Arc::new(BrokerConfig::load_or_default(params.config.as_ref())?);
    info!("leshy starting with config: {:?}", config);

    let pool = Arc::new(ConnectionMap::new(config.connection_ttl));
    let storage = DistributedSqlStorage::new(&params.base_dir, pool.clone());
    let broadcaster: SharedBroadcaster = Arc::new(MessageBroadcaster::new(storage));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    info!("starting janitor");
    runtime::run(pool, &config, shutdown_rx.clone());

    let addr = format!("0.0.0.0:{}", params.port);
    tokio::select! {
        res = server::start(&addr, broadcaster, config, shutdown_rx) => {
            // If the server exits unexpectedly
            let _ = shutdown_tx.send(());
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            let _ = shutdown_tx.send(());
        }
    }

    Ok(())
}
