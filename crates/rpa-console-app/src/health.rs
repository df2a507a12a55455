//! Server liveness probe and the periodic connection indicator.

use std::time::Duration;

use rpa_console_client::RpaClient;
use tracing::debug;

use crate::periodic::{PeriodicTask, TickFlow};

/// Default interval of the connection indicator.
pub const HEALTH_RECHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Calls the liveness endpoint once; any failure reads as unhealthy.
pub async fn probe(client: &RpaClient) -> bool {
    match client.health().await {
        Ok(()) => true,
        Err(error) => {
            debug!(stage = "health", action = "probe", error = %error, "server unhealthy");
            false
        }
    }
}

/// Like [`probe`], but gives up after `timeout`.
pub async fn probe_within(client: &RpaClient, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, probe(client))
        .await
        .unwrap_or_else(|_| {
            debug!(stage = "health", action = "probe", "probe timed out");
            false
        })
}

/// Re-probes every `period` and reports each result to `on_result`.
pub fn spawn_health_monitor<F>(
    client: RpaClient,
    period: Duration,
    timeout: Duration,
    on_result: F,
) -> PeriodicTask
where
    F: Fn(bool) + Send + Sync + Clone + 'static,
{
    PeriodicTask::spawn(period, move || {
        let client = client.clone();
        let on_result = on_result.clone();
        async move {
            on_result(probe_within(&client, timeout).await);
            TickFlow::Continue
        }
    })
}
