//! Periodic background refresh.
//!
//! Each tick re-issues the console's standing load set. Loads run
//! concurrently and failures are isolated per operation; a failed load has
//! already recorded its error on shared state, so the tick just logs and
//! moves on. Ticks that land inside the cache TTL are served from cache.

use crate::client::VantageClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) fn spawn(client: Arc<VantageClient>, cancel: CancellationToken) -> JoinHandle<()> {
    let interval = client.config().refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would duplicate the initial manual loads.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("refresh task cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let (engines, strategies, templates, jobs, alerts, usage, monitoring) = tokio::join!(
                        client.load_engines(),
                        client.load_strategies(),
                        client.load_templates(),
                        client.load_jobs(),
                        client.load_alerts(),
                        client.load_usage(),
                        client.load_monitoring(),
                    );
                    let failures = [
                        engines.is_err(),
                        strategies.is_err(),
                        templates.is_err(),
                        jobs.is_err(),
                        alerts.is_err(),
                        usage.is_err(),
                        monitoring.is_err(),
                    ]
                    .iter()
                    .filter(|failed| **failed)
                    .count();
                    if failures > 0 {
                        tracing::debug!(failures, "refresh tick completed with failures");
                    }
                }
            }
        }
    })
}
