//! Device status cards.

use serde::{Deserialize, Serialize};

use mapek_protocol::{keys, parse_seconds, IntervalStatus, SubjectId, HEARTBEAT_STALENESS_SECS};
use mapek_state::StoreError;

use crate::redis_store::RedisStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCard {
    pub node: String,
    pub status: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCard {
    pub device: String,
    pub heartbeat: Option<f64>,
    pub heartbeat_age_secs: Option<f64>,
    pub online: bool,
    pub nodes: Vec<NodeCard>,
}

/// Assemble one card from raw store values.
pub fn build_device_card(
    device: &str,
    heartbeat_raw: Option<&str>,
    nodes: Vec<(String, Option<String>)>,
    now: f64,
) -> DeviceCard {
    let heartbeat = heartbeat_raw.and_then(|raw| match parse_seconds("heartbeat", raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            tracing::warn!(device = %device, error = %e, "Ignoring malformed heartbeat");
            None
        }
    });
    let heartbeat_age_secs = heartbeat.map(|ts| (now - ts).max(0.0));
    let online = heartbeat_age_secs
        .map(|age| age <= HEARTBEAT_STALENESS_SECS)
        .unwrap_or(false);

    let nodes = nodes
        .into_iter()
        .map(|(node, status)| {
            let color = status
                .as_deref()
                .map(|s| IntervalStatus::from(s).color())
                .unwrap_or(IntervalStatus::Other(String::new()).color())
                .to_string();
            NodeCard {
                node,
                status,
                color,
            }
        })
        .collect();

    DeviceCard {
        device: device.to_string(),
        heartbeat,
        heartbeat_age_secs,
        online,
        nodes,
    }
}

/// Read every device card from the store.
pub async fn load_device_cards(store: &RedisStore, now: f64) -> Result<Vec<DeviceCard>, StoreError> {
    let mut cards = Vec::new();
    for device in store.devices().await? {
        let heartbeat = store.get(&keys::device_heartbeat(&device)).await?;
        let mut nodes = Vec::new();
        for node in store.nodes(&device).await? {
            let status = store.get(&keys::status(&SubjectId::new(device.clone(), node.clone()))).await?;
            nodes.push((node, status));
        }
        cards.push(build_device_card(&device, heartbeat.as_deref(), nodes, now));
    }
    Ok(cards)
}
