use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch::Receiver;
use tracing::{debug, error, info};

use crate::core::pool::ConnectionMap;

/// Periodically evicts expired pool handles until shutdown. Round failures
/// are logged and swallowed; only cancellation ends the loop.
pub async fn run_periodic_clean(
    pool: Arc<ConnectionMap>,
    interval: Duration,
    round_timeout: Duration,
    mut shutdown_rx: Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tokio::time::timeout(round_timeout, clean_round(&pool)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "cleaning round failed"),
                    Err(_) => error!("cleaning round timed out"),
                }
            }

            _ = shutdown_rx.changed() => {
                info!("janitor shutting down");
                break;
            }
        }
    }
}

/// One janitor round: both sub-tasks run in parallel and their failures
/// are folded into a single error for the round.
async fn clean_round(pool: &ConnectionMap) -> anyhow::Result<()> {
    debug!("starting to clean");

    let (conns, msgs) = tokio::join!(remove_stale_connections(pool), remove_old_messages());

    let mut problems = Vec::new();
    if let Err(e) = conns {
        problems.push(format!("removing stale connections: {e}"));
    }
    if let Err(e) = msgs {
        problems.push(format!("removing old messages: {e}"));
    }

    debug!("done cleaning");

    if problems.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("cleaning: {}", problems.join("; ")))
    }
}

async fn remove_stale_connections(pool: &ConnectionMap) -> anyhow::Result<()> {
    let removed = pool.clean();
    info!(removed, "done cleaning stale connections");
    Ok(())
}

/// Retention of old acked rows is not wired up yet; the round keeps the
/// slot so a policy can drop in without reshaping the janitor.
async fn remove_old_messages() -> anyhow::Result<()> {
    Ok(())
}
