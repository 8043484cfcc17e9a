//! Forwarding of run/pause/remove actions to device orchestrators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mapek_protocol::{keys, ControlAction, ControlMessage};
use mapek_state::StoreError;

use crate::redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Protocol(#[from] mapek_protocol::ProtocolError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub device: String,
    pub app: String,
    pub command: ControlAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlOutcome {
    pub channel: String,
    pub payload: String,
    /// Subscribers that received the message.
    pub receivers: i64,
    /// Entries removed from the device's node list, for `remove`.
    pub removed: Option<i64>,
}

/// Validate a request and build the channel/payload pair to publish.
pub fn prepare(request: &ControlRequest) -> Result<(String, String), ControlError> {
    let device = request.device.trim();
    let app = request.app.trim();
    if device.is_empty() {
        return Err(ControlError::MissingField("device"));
    }
    if app.is_empty() {
        return Err(ControlError::MissingField("app"));
    }
    let payload = ControlMessage::new(request.command, app).to_payload()?;
    Ok((keys::orchestrator_channel(device), payload))
}

pub async fn dispatch(store: &RedisStore, request: &ControlRequest) -> Result<ControlOutcome, ControlError> {
    let (channel, payload) = prepare(request)?;
    let receivers = store.publish(&channel, &payload).await?;

    let removed = if request.command == ControlAction::Remove {
        Some(store.remove_node(request.device.trim(), request.app.trim()).await?)
    } else {
        None
    };

    tracing::info!(
        channel = %channel,
        command = request.command.as_str(),
        app = %request.app,
        receivers,
        "Forwarded control command"
    );
    Ok(ControlOutcome {
        channel,
        payload,
        receivers,
        removed,
    })
}
