//! Decoding of trust events received on the pub/sub channel.

use serde_json::Value;
use thiserror::Error;

/// Object keys that may carry the trust flag, in lookup order.
pub const TRUST_PAYLOAD_KEYS: [&str; 7] = ["Str", "str", "trust", "Trust", "value", "ok", "Bool"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustDecodeError {
    #[error("empty payload")]
    Empty,
    #[error("payload is not a boolean-like value: {0:?}")]
    NotBoolean(String),
    #[error("object has no known trust key: {0}")]
    MissingKey(String),
}

/// Decode a trust payload.
///
/// Shapes are tried in a fixed order: bare boolean-like text, then a JSON
/// scalar, then a JSON object holding one of [`TRUST_PAYLOAD_KEYS`].
pub fn decode_trust_payload(payload: &str) -> Result<bool, TrustDecodeError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(TrustDecodeError::Empty);
    }
    if let Some(value) = parse_bool_like(trimmed) {
        return Ok(value);
    }

    let json: Value = serde_json::from_str(trimmed)
        .map_err(|_| TrustDecodeError::NotBoolean(trimmed.to_string()))?;

    match &json {
        Value::Object(map) => {
            let mut present = TRUST_PAYLOAD_KEYS.iter().filter_map(|k| map.get(*k)).peekable();
            let Some(first) = present.peek().copied() else {
                return Err(TrustDecodeError::MissingKey(trimmed.to_string()));
            };
            present
                .find_map(scalar_to_bool)
                .ok_or_else(|| TrustDecodeError::NotBoolean(first.to_string()))
        }
        other => scalar_to_bool(other).ok_or_else(|| TrustDecodeError::NotBoolean(trimmed.to_string())),
    }
}

fn parse_bool_like(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "ok" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn scalar_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool_like(s.trim()),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    }
}
