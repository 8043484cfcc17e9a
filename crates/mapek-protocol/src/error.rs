use thiserror::Error;

/// Errors raised while interpreting values read from the shared store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` is negative: {value}")]
    NegativeDuration { field: &'static str, value: f64 },

    #[error("malformed history entry: {0:?}")]
    MalformedHistoryEntry(String),

    #[error("unknown control command: {0}")]
    UnknownCommand(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Parse a store value as a finite float.
pub fn parse_seconds(field: &'static str, raw: &str) -> Result<f64, ProtocolError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ProtocolError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parse a store value as a finite, non-negative duration.
pub fn parse_duration(field: &'static str, raw: &str) -> Result<f64, ProtocolError> {
    let value = parse_seconds(field, raw)?;
    if value < 0.0 {
        return Err(ProtocolError::NegativeDuration { field, value });
    }
    Ok(value)
}
