//! Live channel manager with reconnect backoff.
//!
//! Subscribes through the transport, applies each push event to shared
//! state, and reconnects with jittered exponential backoff when the channel
//! drops. Cancelling the token stops the task mid-stream or mid-sleep, so no
//! event is applied after `close()`.

use crate::client::VantageClient;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) fn spawn(client: Arc<VantageClient>, cancel: CancellationToken) -> JoinHandle<()> {
    let reconnect = client.config().reconnect.clone();
    tokio::spawn(async move {
        let transport = client.transport();
        let state = client.state();
        let mut backoff = reconnect.initial_ms;
        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => return,
                result = transport.subscribe() => result,
            };

            match subscribed {
                Ok(mut receiver) => {
                    backoff = reconnect.initial_ms;
                    state.write().await.live.connected = true;
                    loop {
                        let event = tokio::select! {
                            _ = cancel.cancelled() => return,
                            event = receiver.recv() => event,
                        };
                        match event {
                            Some(event) => {
                                tracing::trace!(event_type = event.event_type(), "push event");
                                state.write().await.apply_push_event(event);
                            }
                            None => break,
                        }
                    }
                    state.write().await.live.connected = false;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "live channel connect failed");
                }
            }

            let delay = jittered_backoff(backoff, reconnect.jitter_ms);
            tracing::debug!(delay_ms = delay, "reconnecting live channel");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
            let next = (backoff as f64 * reconnect.multiplier) as u64;
            backoff = next.min(reconnect.max_ms);
        }
    })
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}
