//! Periodic refresh of the timeline frame and the device cards.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, RwLock};

use mapek_state::{ExecutionStore, TimelineAggregator, TimelineFrame};

use crate::devices::{load_device_cards, DeviceCard};
use crate::redis_store::RedisStore;

/// Latest data served to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub timeline: TimelineFrame,
    pub devices: Vec<DeviceCard>,
    /// Last failure of the timeline tick, cleared by the next success.
    pub timeline_error: Option<String>,
    pub devices_error: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            timeline: TimelineFrame::default(),
            devices: Vec::new(),
            timeline_error: None,
            devices_error: None,
            started_at: chrono::Utc::now(),
        }
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one timeline tick and store the outcome.
///
/// On failure the previous frame stays in place.
pub async fn refresh_timeline<S: ExecutionStore>(
    aggregator: &TimelineAggregator<S>,
    state: &RwLock<DashboardState>,
) {
    match aggregator.tick().await {
        Ok(frame) => {
            let mut s = state.write().await;
            s.timeline = frame;
            s.timeline_error = None;
        }
        Err(e) => {
            tracing::error!(error = %e, "Timeline tick failed");
            state.write().await.timeline_error = Some(e.to_string());
        }
    }
}

async fn refresh_devices(store: &RedisStore, state: &RwLock<DashboardState>) {
    match load_device_cards(store, mapek_protocol::unix_now_secs()).await {
        Ok(cards) => {
            let mut s = state.write().await;
            s.devices = cards;
            s.devices_error = None;
        }
        Err(e) => {
            tracing::error!(error = %e, "Device card refresh failed");
            state.write().await.devices_error = Some(e.to_string());
        }
    }
}

/// Drive both refreshes until shutdown. Ticks never overlap.
pub async fn run_monitor_loop(
    aggregator: Arc<TimelineAggregator<RedisStore>>,
    store: RedisStore,
    state: Arc<RwLock<DashboardState>>,
    tick_period: Duration,
    cards_period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timeline_tick = tokio::time::interval(tick_period);
    let mut cards_tick = tokio::time::interval(cards_period);
    timeline_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    cards_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        tick_ms = tick_period.as_millis() as u64,
        cards_ms = cards_period.as_millis() as u64,
        filter = ?aggregator.filter(),
        "Monitor loop started"
    );

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = timeline_tick.tick() => refresh_timeline(&aggregator, &state).await,
            _ = cards_tick.tick() => refresh_devices(&store, &state).await,
        }
    }
    tracing::info!("Monitor loop stopped");
}
