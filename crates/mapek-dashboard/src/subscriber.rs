//! Background listener feeding the trust buffer from the pub/sub channel.
//!
//! Spawned once at startup. The returned handle owns the task; the shared
//! shutdown channel breaks the blocking wait and drops the subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use mapek_protocol::decode_trust_payload;
use mapek_state::TrustBuffer;

use crate::config::TrustConfig;

/// Why [`pump_messages`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The message stream ended (connection lost).
    Closed,
    /// Shutdown was requested.
    Shutdown,
}

pub struct TrustListenerHandle {
    join: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl TrustListenerHandle {
    /// Shared flag, false once the listener has stopped for good.
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Wait for the task to finish. Signal shutdown first.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Trust listener task panicked");
        }
    }
}

/// Decode one payload into the buffer. Undecodable payloads are logged and dropped.
pub fn apply_payload(buffer: &TrustBuffer, payload: &str, now: f64) -> Option<bool> {
    match decode_trust_payload(payload) {
        Ok(value) => {
            buffer.record_at(value, now);
            tracing::debug!(value, "Trust event received");
            Some(value)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring trust payload");
            None
        }
    }
}

/// Apply messages in arrival order until the stream ends or shutdown is signalled.
pub async fn pump_messages<St>(
    mut messages: St,
    buffer: &TrustBuffer,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit
where
    St: Stream<Item = Result<String, String>> + Unpin,
{
    if *shutdown.borrow() {
        return PumpExit::Shutdown;
    }
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return PumpExit::Shutdown;
                }
            }
            item = messages.next() => match item {
                Some(Ok(payload)) => {
                    apply_payload(buffer, &payload, mapek_protocol::unix_now_secs());
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Unreadable trust message payload");
                }
                None => return PumpExit::Closed,
            }
        }
    }
}

async fn subscribe_once(
    client: &redis::Client,
    channel: &str,
    buffer: &TrustBuffer,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<PumpExit, redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    tracing::info!(channel = %channel, "Subscribed to trust channel");

    let exit = {
        let messages = pubsub
            .on_message()
            .map(|msg| msg.get_payload::<String>().map_err(|e| e.to_string()));
        pump_messages(Box::pin(messages), buffer, shutdown).await
    };
    if exit == PumpExit::Shutdown {
        if let Err(e) = pubsub.unsubscribe(channel).await {
            tracing::debug!(error = %e, channel = %channel, "Unsubscribe failed during shutdown");
        }
    }
    Ok(exit)
}

async fn run_listener(
    client: redis::Client,
    config: TrustConfig,
    buffer: Arc<TrustBuffer>,
    mut shutdown: watch::Receiver<bool>,
    alive: Arc<AtomicBool>,
) {
    loop {
        match subscribe_once(&client, &config.channel, &buffer, &mut shutdown).await {
            Ok(PumpExit::Shutdown) => break,
            Ok(PumpExit::Closed) => {
                tracing::error!(channel = %config.channel, "Trust subscription closed");
            }
            Err(e) => {
                tracing::error!(channel = %config.channel, error = %e, "Trust subscription failed");
            }
        }

        if config.reconnect_secs == 0 {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.reconnect_secs)) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            break;
        }
        tracing::info!(channel = %config.channel, "Resubscribing to trust channel");
    }

    alive.store(false, Ordering::Relaxed);
    tracing::info!(channel = %config.channel, "Trust listener stopped");
}

/// Start the listener task.
pub fn spawn_trust_listener(
    client: redis::Client,
    config: TrustConfig,
    buffer: Arc<TrustBuffer>,
    shutdown: watch::Receiver<bool>,
) -> TrustListenerHandle {
    let alive = Arc::new(AtomicBool::new(true));
    let join = tokio::spawn(run_listener(client, config, buffer, shutdown, Arc::clone(&alive)));
    TrustListenerHandle { join, alive }
}
