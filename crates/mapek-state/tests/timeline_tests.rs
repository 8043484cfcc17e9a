use std::sync::Arc;

use mapek_protocol::{keys, ExecutionInterval, IntervalStatus, SubjectId, HISTORY_CAP};
use mapek_state::{MemoryStore, StatusFilter, TimelineAggregator};

const NOW: f64 = 1_700_000_000.0;

fn subject() -> SubjectId {
    SubjectId::new("Device1", "Monitor")
}

fn store_with_subject() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_subject(&subject());
    store
}

fn set_current(store: &MemoryStore, subject: &SubjectId, start: f64, duration: f64, status: &str) {
    store.set(&keys::start_execution(subject), start);
    store.set(&keys::execution_time(subject), duration);
    store.set(&keys::status(subject), status);
}

fn history_len(store: &MemoryStore, subject: &SubjectId) -> usize {
    store.list(&keys::execution_history(subject)).len()
}

#[tokio::test]
async fn test_subject_without_data_emits_nothing() {
    let store = store_with_subject();
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    let frame = aggregator.tick_at(NOW).await.unwrap();
    assert!(frame.bars.is_empty());
    assert_eq!(frame.subjects, vec![subject()]);
    assert_eq!(history_len(&store, &subject()), 0);
}

#[tokio::test]
async fn test_new_execution_is_drawn_and_recorded() {
    let store = store_with_subject();
    set_current(&store, &subject(), NOW - 3.0, 1.0, "running");
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    let frame = aggregator.tick_at(NOW).await.unwrap();
    assert_eq!(frame.bars.len(), 1);
    assert_eq!(frame.bars[0].bar_start, -3.0);
    assert_eq!(frame.bars[0].bar_width, 1.0);
    assert_eq!(frame.appended, 1);
    assert_eq!(history_len(&store, &subject()), 1);
}

#[tokio::test]
async fn test_repeated_tick_does_not_duplicate_history() {
    let store = store_with_subject();
    set_current(&store, &subject(), NOW - 3.0, 1.0, "running");
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    let first = aggregator.tick_at(NOW).await.unwrap();
    let second = aggregator.tick_at(NOW).await.unwrap();

    assert_eq!(first.bars, second.bars);
    assert_eq!(second.appended, 0);
    assert_eq!(history_len(&store, &subject()), 1);
}

#[tokio::test]
async fn test_near_identical_execution_is_suppressed() {
    let store = store_with_subject();
    set_current(&store, &subject(), NOW - 3.0, 1.0, "running");
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);
    aggregator.tick_at(NOW).await.unwrap();

    // Producer rewrites the same execution with rounding noise.
    set_current(&store, &subject(), NOW - 2.95, 1.04, "running");
    let frame = aggregator.tick_at(NOW + 0.5).await.unwrap();

    assert_eq!(frame.appended, 0);
    assert_eq!(history_len(&store, &subject()), 1);
}

#[tokio::test]
async fn test_concurrent_ticks_record_once() {
    let store = store_with_subject();
    set_current(&store, &subject(), NOW - 3.0, 1.0, "running");
    let aggregator = Arc::new(TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly));

    let a = tokio::spawn({
        let agg = aggregator.clone();
        async move { agg.tick_at(NOW).await.map(|f| f.appended) }
    });
    let b = tokio::spawn({
        let agg = aggregator.clone();
        async move { agg.tick_at(NOW).await.map(|f| f.appended) }
    });
    let total = a.await.unwrap().unwrap() + b.await.unwrap().unwrap();

    assert_eq!(total, 1);
    assert_eq!(history_len(&store, &subject()), 1);
}

#[tokio::test]
async fn test_history_never_exceeds_cap() {
    let store = store_with_subject();
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    for i in 0..(HISTORY_CAP + 25) {
        let now = NOW + i as f64;
        set_current(&store, &subject(), now - 0.5, 0.3, "running");
        aggregator.tick_at(now).await.unwrap();
        assert!(history_len(&store, &subject()) <= HISTORY_CAP);
    }
    assert_eq!(history_len(&store, &subject()), HISTORY_CAP);
}

#[tokio::test]
async fn test_newest_history_entry_is_first() {
    let store = store_with_subject();
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    set_current(&store, &subject(), NOW - 5.0, 1.0, "running");
    aggregator.tick_at(NOW).await.unwrap();
    set_current(&store, &subject(), NOW - 1.0, 0.5, "running");
    aggregator.tick_at(NOW).await.unwrap();

    let raw = store.list(&keys::execution_history(&subject()));
    let newest = ExecutionInterval::decode_history_entry(&subject(), &raw[0]).unwrap();
    assert_eq!(newest.start, NOW - 1.0);
}

#[tokio::test]
async fn test_entries_outside_window_are_not_emitted() {
    let store = store_with_subject();
    let history_key = keys::execution_history(&subject());
    for start in [NOW - 40.0, NOW - 15.5, NOW + 2.0, NOW - 10.0] {
        let interval = ExecutionInterval::new(subject(), start, 1.0, IntervalStatus::Running);
        store.lpush(&history_key, interval.encode_history_entry().unwrap());
    }
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    let frame = aggregator.tick_at(NOW).await.unwrap();
    assert_eq!(frame.bars.len(), 1);
    assert_eq!(frame.bars[0].bar_start, -10.0);
}

#[tokio::test]
async fn test_bars_never_extend_past_now() {
    let store = store_with_subject();
    let history_key = keys::execution_history(&subject());
    for (start, duration) in [(NOW - 1.0, 4.0), (NOW - 7.0, 2.0), (NOW - 0.2, 0.1)] {
        let interval = ExecutionInterval::new(subject(), start, duration, IntervalStatus::Running);
        store.lpush(&history_key, interval.encode_history_entry().unwrap());
    }
    set_current(&store, &subject(), NOW - 2.0, 9.0, "running");
    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);

    let frame = aggregator.tick_at(NOW).await.unwrap();
    assert_eq!(frame.bars.len(), 4);
    assert!(frame.bars.iter().all(|b| b.bar_start + b.bar_width <= 0.0));
    assert!(frame.bars.iter().all(|b| b.bar_width > 0.0));
}

#[tokio::test]
async fn test_status_policy_controls_rendering_not_recording() {
    let store = store_with_subject();
    set_current(&store, &subject(), NOW - 3.0, 1.0, "error");

    let running_only = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);
    let frame = running_only.tick_at(NOW).await.unwrap();
    assert!(frame.bars.is_empty());
    assert_eq!(history_len(&store, &subject()), 1);

    let all = TimelineAggregator::new(store.clone(), StatusFilter::All);
    let frame = all.tick_at(NOW).await.unwrap();
    assert_eq!(frame.bars.len(), 1);
    assert_eq!(frame.bars[0].status, IntervalStatus::Error);
}

#[tokio::test]
async fn test_corrupt_subject_does_not_block_others() {
    let store = store_with_subject();
    let healthy = SubjectId::new("Device2", "Plan");
    store.add_subject(&healthy);

    store.lpush(&keys::execution_history(&subject()), "x,y,z");
    store.set(&keys::start_execution(&subject()), "not-a-time");
    store.set(&keys::execution_time(&subject()), "1.0");
    set_current(&store, &healthy, NOW - 4.0, 2.0, "running");

    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);
    let frame = aggregator.tick_at(NOW).await.unwrap();

    assert_eq!(frame.subjects.len(), 2);
    assert_eq!(frame.bars.len(), 1);
    assert_eq!(frame.bars[0].subject, healthy);
}

#[tokio::test]
async fn test_legacy_keys_feed_every_device_running_the_node() {
    let store = Arc::new(MemoryStore::new());
    let a = SubjectId::new("Device1", "Execute");
    let b = SubjectId::new("Device2", "Execute");
    store.add_subject(&a);
    store.add_subject(&b);
    store.set(&keys::legacy_start_execution("Execute"), NOW - 2.0);
    store.set(&keys::legacy_execution_time("Execute"), 0.5);
    store.set(&keys::status(&a), "running");
    store.set(&keys::status(&b), "running");

    let aggregator = TimelineAggregator::new(store.clone(), StatusFilter::RunningOnly);
    let frame = aggregator.tick_at(NOW).await.unwrap();

    assert_eq!(frame.bars.len(), 2);
    assert_eq!(history_len(&store, &a), 1);
    assert_eq!(history_len(&store, &b), 1);
}
