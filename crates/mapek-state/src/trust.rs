//! Trust event buffer.
//!
//! Written by the pub/sub listener, read by the HTTP layer. Every access
//! goes through one mutex and readers get copies, never references.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use mapek_protocol::{TrustEvent, DEFAULT_TRUST_DISPLAY_SECS, TRUST_HISTORY_WINDOW_SECS};

const TRUSTED_COLOR: &str = "#2ecc71";
const DISTRUSTED_COLOR: &str = "#e74c3c";

fn trust_color(value: bool) -> &'static str {
    if value {
        TRUSTED_COLOR
    } else {
        DISTRUSTED_COLOR
    }
}

#[derive(Debug, Default)]
struct TrustState {
    latest: Option<TrustEvent>,
    /// Arrival order, oldest first.
    history: VecDeque<TrustEvent>,
}

/// Fixed-width marker on the trust strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustMarker {
    /// Seconds before now, in `[-history_window, 0]`.
    pub offset: f64,
    pub value: bool,
    pub color: String,
}

/// Point-in-time copy of the buffer plus derived display state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSnapshot {
    pub generated_at: f64,
    pub latest: Option<TrustEvent>,
    pub popup_visible: bool,
    pub popup_color: Option<String>,
    pub display_secs: f64,
    pub history_window_secs: f64,
    pub markers: Vec<TrustMarker>,
}

pub struct TrustBuffer {
    state: Mutex<TrustState>,
    display_secs: f64,
    history_window_secs: f64,
}

impl Default for TrustBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRUST_DISPLAY_SECS)
    }
}

impl TrustBuffer {
    pub fn new(display_secs: f64) -> Self {
        Self {
            state: Mutex::new(TrustState::default()),
            display_secs,
            history_window_secs: TRUST_HISTORY_WINDOW_SECS,
        }
    }

    pub fn display_secs(&self) -> f64 {
        self.display_secs
    }

    fn lock(&self) -> MutexGuard<'_, TrustState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, value: bool) -> TrustEvent {
        self.record_at(value, mapek_protocol::unix_now_secs())
    }

    /// Apply one event received at `now` and sweep expired history.
    pub fn record_at(&self, value: bool, now: f64) -> TrustEvent {
        let event = TrustEvent {
            timestamp: now,
            value,
        };
        let cutoff = now - self.history_window_secs;
        let mut state = self.lock();
        state.latest = Some(event);
        state.history.push_back(event);
        state.history.retain(|e| e.timestamp > cutoff);
        event
    }

    pub fn latest(&self) -> Option<TrustEvent> {
        self.lock().latest
    }

    /// Copy of the history as of the last sweep, oldest first.
    pub fn history(&self) -> Vec<TrustEvent> {
        self.lock().history.iter().copied().collect()
    }

    /// True while `latest` is at most `display_secs` old.
    pub fn popup_visible(latest: Option<&TrustEvent>, now: f64, display_secs: f64) -> bool {
        latest
            .map(|e| {
                let age = now - e.timestamp;
                age >= 0.0 && age <= display_secs
            })
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> TrustSnapshot {
        self.snapshot_at(mapek_protocol::unix_now_secs())
    }

    pub fn snapshot_at(&self, now: f64) -> TrustSnapshot {
        let (latest, history) = {
            let state = self.lock();
            (state.latest, state.history.iter().copied().collect::<Vec<_>>())
        };

        let popup_visible = Self::popup_visible(latest.as_ref(), now, self.display_secs);
        let markers = history
            .iter()
            .filter_map(|e| {
                let elapsed = now - e.timestamp;
                (0.0..=self.history_window_secs).contains(&elapsed).then(|| TrustMarker {
                    offset: -elapsed,
                    value: e.value,
                    color: trust_color(e.value).to_string(),
                })
            })
            .collect();

        TrustSnapshot {
            generated_at: now,
            latest,
            popup_visible,
            popup_color: latest
                .filter(|_| popup_visible)
                .map(|e| trust_color(e.value).to_string()),
            display_secs: self.display_secs,
            history_window_secs: self.history_window_secs,
            markers,
        }
    }
}
