use serde::{Deserialize, Serialize};

use crate::constants::DUPLICATE_TOLERANCE_SECS;
use crate::error::{parse_duration, parse_seconds, ProtocolError};

/// A device + node pair whose executions are tracked on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId {
    pub device: String,
    pub node: String,
}

impl SubjectId {
    pub fn new(device: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            node: node.into(),
        }
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device, self.node)
    }
}

/// Execution status tag written by the producer.
///
/// Unknown tags are kept verbatim so they still show up on the chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntervalStatus {
    Running,
    Active,
    Building,
    Error,
    Completed,
    Other(String),
}

impl IntervalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Active => "active",
            Self::Building => "building",
            Self::Error => "error",
            Self::Completed => "completed",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Bar color used by the timeline chart.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Running => "#2ecc71",
            Self::Active => "#3498db",
            Self::Building => "#f39c12",
            Self::Error => "#e74c3c",
            Self::Completed => "#7f8c8d",
            Self::Other(_) => "#95a5a6",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<&str> for IntervalStatus {
    fn from(raw: &str) -> Self {
        let tag = raw.trim();
        match tag.to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "active" => Self::Active,
            "building" => Self::Building,
            "error" => Self::Error,
            "completed" => Self::Completed,
            _ => Self::Other(tag.to_string()),
        }
    }
}

impl From<String> for IntervalStatus {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<IntervalStatus> for String {
    fn from(status: IntervalStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for IntervalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bounded execution of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInterval {
    pub subject: SubjectId,
    /// Absolute unix timestamp, fractional seconds.
    pub start: f64,
    /// Elapsed seconds, never negative.
    pub duration: f64,
    pub status: IntervalStatus,
}

/// Stored form of a history entry. The subject is implied by the list key.
#[derive(Debug, Serialize, Deserialize)]
struct HistoryRecord {
    start: f64,
    duration: f64,
    status: String,
}

impl ExecutionInterval {
    pub fn new(subject: SubjectId, start: f64, duration: f64, status: IntervalStatus) -> Self {
        Self {
            subject,
            start,
            duration,
            status,
        }
    }

    /// Same subject, and both start and duration within the duplicate tolerance.
    pub fn is_duplicate_of(&self, other: &ExecutionInterval) -> bool {
        self.subject == other.subject
            && (self.start - other.start).abs() < DUPLICATE_TOLERANCE_SECS
            && (self.duration - other.duration).abs() < DUPLICATE_TOLERANCE_SECS
    }

    /// Seconds between `start` and `now`.
    pub fn elapsed_at(&self, now: f64) -> f64 {
        now - self.start
    }

    /// Encode for the per-subject history list.
    pub fn encode_history_entry(&self) -> Result<String, ProtocolError> {
        let record = HistoryRecord {
            start: self.start,
            duration: self.duration,
            status: self.status.as_str().to_string(),
        };
        serde_json::to_string(&record).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode a history list entry.
    ///
    /// Accepts the JSON record written by [`encode_history_entry`](Self::encode_history_entry)
    /// and the older `start,duration,status` form still written by some producers.
    pub fn decode_history_entry(subject: &SubjectId, raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            let record: HistoryRecord = serde_json::from_str(trimmed)
                .map_err(|_| ProtocolError::MalformedHistoryEntry(raw.to_string()))?;
            if !record.start.is_finite() || !record.duration.is_finite() {
                return Err(ProtocolError::MalformedHistoryEntry(raw.to_string()));
            }
            if record.duration < 0.0 {
                return Err(ProtocolError::NegativeDuration {
                    field: "duration",
                    value: record.duration,
                });
            }
            return Ok(Self::new(
                subject.clone(),
                record.start,
                record.duration,
                IntervalStatus::from(record.status),
            ));
        }

        let mut parts = trimmed.splitn(3, ',');
        let (Some(start), Some(duration), Some(status)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ProtocolError::MalformedHistoryEntry(raw.to_string()));
        };
        Ok(Self::new(
            subject.clone(),
            parse_seconds("start", start)?,
            parse_duration("duration", duration)?,
            IntervalStatus::from(status),
        ))
    }
}

/// A clipped bar ready for the chart. The x-axis is seconds before now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBar {
    pub subject: SubjectId,
    /// Always in `[-window, 0]`.
    pub bar_start: f64,
    /// Positive, and `bar_start + bar_width <= 0`.
    pub bar_width: f64,
    pub status: IntervalStatus,
    pub color: String,
}

/// One decoded trust signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustEvent {
    /// Receive time, fractional unix seconds.
    pub timestamp: f64,
    pub value: bool,
}
