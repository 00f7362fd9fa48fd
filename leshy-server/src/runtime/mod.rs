/*
Coordinates background behaviors during live execution: the janitor that
prunes expired database handles (and, later, old acked messages).
*/
use std::sync::Arc;

use tokio::sync::watch::Receiver;

use crate::config::BrokerConfig;
use crate::core::pool::ConnectionMap;

mod janitor;

pub use janitor::run_periodic_clean;

pub fn run(pool: Arc<ConnectionMap>, config: &BrokerConfig, shutdown_rx: Receiver<()>) {
    tokio::spawn(janitor::run_periodic_clean(
        pool,
        config.janitor_interval,
        config.janitor_round_timeout,
        shutdown_rx,
    ));
}
