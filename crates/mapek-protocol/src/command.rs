use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Command forwarded to a device orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Start (or resume) the component.
    #[serde(alias = "run")]
    Up,
    /// Pause the component.
    #[serde(alias = "pause", alias = "stop")]
    Down,
    /// Remove the component from the device.
    #[serde(alias = "delete")]
    Remove,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Remove => "remove",
        }
    }
}

impl std::str::FromStr for ControlAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "run" => Ok(Self::Up),
            "down" | "pause" | "stop" => Ok(Self::Down),
            "remove" | "delete" => Ok(Self::Remove),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Message published on `{device}-orchestrator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub command: ControlAction,
    pub app: String,
}

impl ControlMessage {
    pub fn new(command: ControlAction, app: impl Into<String>) -> Self {
        Self {
            command,
            app: app.into(),
        }
    }

    pub fn to_payload(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}
