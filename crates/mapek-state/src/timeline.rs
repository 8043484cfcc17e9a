//! Execution timeline reconstruction.
//!
//! Each tick reads every subject's stored history plus its current-execution
//! pair, clips what falls inside the look-back window onto a shared
//! "seconds before now" axis, and promotes a current pair into history the
//! first time it is seen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use mapek_protocol::{
    parse_duration, parse_seconds, ExecutionInterval, IntervalStatus, SubjectId, TimelineBar,
    HISTORY_CAP, TIME_WINDOW_SECS,
};

use crate::store::{CurrentExecutionRaw, ExecutionStore, StoreError};

/// Which statuses are drawn on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Only intervals tagged `running`.
    #[default]
    RunningOnly,
    /// Every status, colored per status.
    All,
}

impl StatusFilter {
    pub fn admits(&self, status: &IntervalStatus) -> bool {
        match self {
            Self::RunningOnly => status.is_running(),
            Self::All => true,
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "running_only" | "running" => Ok(Self::RunningOnly),
            "all" => Ok(Self::All),
            other => Err(format!("unknown status filter: {other}")),
        }
    }
}

/// Result of reconciling one subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectOutcome {
    pub bars: Vec<TimelineBar>,
    /// Current execution not yet present in history.
    pub new_entry: Option<ExecutionInterval>,
    /// Entries or fields that failed to parse.
    pub skipped: usize,
}

/// Everything the chart needs for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineFrame {
    pub generated_at: f64,
    pub window_secs: f64,
    pub subjects: Vec<SubjectId>,
    pub bars: Vec<TimelineBar>,
    /// History entries appended during this tick.
    pub appended: usize,
}

/// Clip an interval onto the shared axis, or drop it.
///
/// Returns `None` when the interval started in the future, is older than
/// `window`, fails `filter`, or has nothing left after clipping at 0.
pub fn clip_to_bar(
    interval: &ExecutionInterval,
    now: f64,
    window: f64,
    filter: StatusFilter,
) -> Option<TimelineBar> {
    let elapsed = interval.elapsed_at(now);
    if !(0.0..=window).contains(&elapsed) || !filter.admits(&interval.status) {
        return None;
    }
    let bar_start = -elapsed;
    let mut bar_width = interval.duration;
    if bar_start + bar_width > 0.0 {
        bar_width = -bar_start;
    }
    if bar_width <= 0.0 {
        return None;
    }
    Some(TimelineBar {
        subject: interval.subject.clone(),
        bar_start,
        bar_width,
        status: interval.status.clone(),
        color: interval.status.color().to_string(),
    })
}

/// Reconcile one subject's stored history with its current execution.
pub fn reconcile_subject(
    subject: &SubjectId,
    raw_history: &[String],
    current: &CurrentExecutionRaw,
    now: f64,
    window: f64,
    filter: StatusFilter,
) -> SubjectOutcome {
    let mut outcome = SubjectOutcome::default();
    let mut history = Vec::with_capacity(raw_history.len());

    for raw in raw_history {
        match ExecutionInterval::decode_history_entry(subject, raw) {
            Ok(interval) => history.push(interval),
            Err(e) => {
                outcome.skipped += 1;
                tracing::warn!(subject = %subject, error = %e, "Skipping history entry");
            }
        }
    }

    outcome.bars.extend(
        history
            .iter()
            .filter_map(|interval| clip_to_bar(interval, now, window, filter)),
    );

    let (Some(raw_duration), Some(raw_start)) = (&current.execution_time, &current.start_execution)
    else {
        return outcome;
    };
    let parsed = parse_seconds("start_execution", raw_start)
        .and_then(|start| parse_duration("execution_time", raw_duration).map(|d| (start, d)));
    let (start, duration) = match parsed {
        Ok(pair) => pair,
        Err(e) => {
            outcome.skipped += 1;
            tracing::warn!(subject = %subject, error = %e, "Skipping current execution");
            return outcome;
        }
    };

    let status = current
        .status
        .as_deref()
        .map(IntervalStatus::from)
        .unwrap_or_else(|| IntervalStatus::Other("unknown".to_string()));
    let candidate = ExecutionInterval::new(subject.clone(), start, duration, status);

    if history.iter().any(|h| candidate.is_duplicate_of(h)) {
        return outcome;
    }
    outcome.bars.extend(clip_to_bar(&candidate, now, window, filter));
    outcome.new_entry = Some(candidate);
    outcome
}

/// Drives timeline reconstruction against a store.
pub struct TimelineAggregator<S> {
    store: Arc<S>,
    window_secs: f64,
    history_cap: usize,
    filter: StatusFilter,
    /// Serializes ticks so two callers cannot both promote the same execution.
    tick_lock: Mutex<()>,
}

impl<S: ExecutionStore> TimelineAggregator<S> {
    pub fn new(store: Arc<S>, filter: StatusFilter) -> Self {
        Self {
            store,
            window_secs: TIME_WINDOW_SECS,
            history_cap: HISTORY_CAP,
            filter,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn tick(&self) -> Result<TimelineFrame, StoreError> {
        self.tick_at(mapek_protocol::unix_now_secs()).await
    }

    /// Build the frame for `now`.
    ///
    /// Only a failure to list subjects is returned; per-subject failures are
    /// logged and that subject contributes nothing to the frame.
    pub async fn tick_at(&self, now: f64) -> Result<TimelineFrame, StoreError> {
        let _guard = self.tick_lock.lock().await;
        let subjects = self.store.subjects().await?;

        let mut frame = TimelineFrame {
            generated_at: now,
            window_secs: self.window_secs,
            subjects: Vec::with_capacity(subjects.len()),
            bars: Vec::new(),
            appended: 0,
        };

        for subject in subjects {
            let history = match self.store.execution_history(&subject).await {
                Ok(h) => h,
                Err(e) => {
                    tracing::error!(subject = %subject, error = %e, "Failed to read execution history");
                    frame.subjects.push(subject);
                    continue;
                }
            };
            let current = match self.store.current_execution(&subject).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(subject = %subject, error = %e, "Failed to read current execution");
                    CurrentExecutionRaw::default()
                }
            };

            let outcome =
                reconcile_subject(&subject, &history, &current, now, self.window_secs, self.filter);
            frame.bars.extend(outcome.bars);

            if let Some(entry) = outcome.new_entry {
                match self.store.push_history(&entry, self.history_cap).await {
                    Ok(()) => {
                        frame.appended += 1;
                        tracing::debug!(
                            subject = %subject,
                            start = entry.start,
                            duration = entry.duration,
                            "Recorded new execution"
                        );
                    }
                    Err(e) => {
                        tracing::error!(subject = %subject, error = %e, "Failed to append execution history");
                    }
                }
            }
            frame.subjects.push(subject);
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        SubjectId::new("D1", "Monitor")
    }

    fn running(start: f64, duration: f64) -> ExecutionInterval {
        ExecutionInterval::new(subject(), start, duration, IntervalStatus::Running)
    }

    #[test]
    fn test_clip_shrinks_bar_ending_in_future() {
        let bar = clip_to_bar(&running(98.0, 5.0), 100.0, 15.0, StatusFilter::RunningOnly).unwrap();
        assert_eq!(bar.bar_start, -2.0);
        assert_eq!(bar.bar_width, 2.0);
    }

    #[test]
    fn test_clip_drops_out_of_window() {
        assert!(clip_to_bar(&running(80.0, 1.0), 100.0, 15.0, StatusFilter::All).is_none());
        assert!(clip_to_bar(&running(101.0, 1.0), 100.0, 15.0, StatusFilter::All).is_none());
    }

    #[test]
    fn test_clip_keeps_window_edge() {
        let bar = clip_to_bar(&running(85.0, 1.0), 100.0, 15.0, StatusFilter::All).unwrap();
        assert_eq!(bar.bar_start, -15.0);
    }

    #[test]
    fn test_clip_drops_zero_width() {
        assert!(clip_to_bar(&running(100.0, 1.0), 100.0, 15.0, StatusFilter::All).is_none());
        assert!(clip_to_bar(&running(95.0, 0.0), 100.0, 15.0, StatusFilter::All).is_none());
    }

    #[test]
    fn test_filter_policy() {
        let error = ExecutionInterval::new(subject(), 95.0, 1.0, IntervalStatus::Error);
        assert!(clip_to_bar(&error, 100.0, 15.0, StatusFilter::RunningOnly).is_none());
        let bar = clip_to_bar(&error, 100.0, 15.0, StatusFilter::All).unwrap();
        assert_eq!(bar.color, IntervalStatus::Error.color());
    }

    #[test]
    fn test_status_filter_from_str() {
        assert_eq!("running-only".parse::<StatusFilter>().unwrap(), StatusFilter::RunningOnly);
        assert_eq!("ALL".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert!("some".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_reconcile_skips_bad_entries_and_keeps_good_ones() {
        let history = vec![
            "not,a,number".to_string(),
            running(95.0, 1.0).encode_history_entry().unwrap(),
            "garbage".to_string(),
        ];
        let outcome = reconcile_subject(
            &subject(),
            &history,
            &CurrentExecutionRaw::default(),
            100.0,
            15.0,
            StatusFilter::RunningOnly,
        );
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.bars.len(), 1);
        assert!(outcome.new_entry.is_none());
    }

    #[test]
    fn test_reconcile_malformed_current_pair() {
        let current = CurrentExecutionRaw {
            execution_time: Some("fast".to_string()),
            start_execution: Some("97.0".to_string()),
            status: Some("running".to_string()),
        };
        let outcome =
            reconcile_subject(&subject(), &[], &current, 100.0, 15.0, StatusFilter::RunningOnly);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.bars.is_empty());
        assert!(outcome.new_entry.is_none());
    }

    #[test]
    fn test_reconcile_promotes_non_running_current_without_drawing_it() {
        let current = CurrentExecutionRaw {
            execution_time: Some("1.0".to_string()),
            start_execution: Some("97.0".to_string()),
            status: Some("paused".to_string()),
        };
        let outcome =
            reconcile_subject(&subject(), &[], &current, 100.0, 15.0, StatusFilter::RunningOnly);
        assert!(outcome.bars.is_empty());
        assert!(outcome.new_entry.is_some());
    }
}
