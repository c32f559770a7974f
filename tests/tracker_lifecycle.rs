//! Tracker lifecycle integration tests.
//!
//! Drives a `RunTracker` end to end: channel-fed location fixes, a manual
//! wall clock, tokio's paused timer and a SQLite store.
//!
//! Run with: `cargo test --test tracker_lifecycle`

use std::sync::Arc;

use rush_tracker::{
    metrics, AggregateStatistics, ChannelLocationSource, GeoSample, GpsPoint, ManualClock,
    Result, RunSession, RunState, RunTracker, SessionQuery, SessionStore, SqliteSessionStore,
    TrackerConfig, TrackerError,
};
use tempfile::TempDir;

const T0: i64 = 1_700_000_000_000;

struct Setup {
    tracker: RunTracker,
    source: Arc<ChannelLocationSource>,
    store: Arc<SqliteSessionStore>,
    clock: Arc<ManualClock>,
    _tmp: TempDir,
}

/// Helper: tracker over a temp database, a channel source and a manual clock.
fn setup() -> Setup {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().expect("failed to create temp dir");
    let store = Arc::new(
        SqliteSessionStore::open(tmp.path().join("runs.db")).expect("failed to open store"),
    );
    let source = Arc::new(ChannelLocationSource::new());
    let clock = Arc::new(ManualClock::new(T0));
    let tracker = RunTracker::new(
        TrackerConfig::default(),
        source.clone(),
        store.clone(),
        clock.clone(),
    )
    .expect("failed to create tracker");

    Setup {
        tracker,
        source,
        store,
        clock,
        _tmp: tmp,
    }
}

/// Let aborted tasks be dropped.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Test: Round Trip
// ============================================================================

#[tokio::test(start_paused = true)]
async fn three_sample_round_trip() {
    let s = setup();
    let mut live = s.tracker.subscribe_live();
    let id = s.tracker.start().unwrap();

    for i in 0..3 {
        s.source
            .push(GeoSample::new(0.0, 0.001 * i as f64, T0 + i * 1_000).with_speed(2.0 + i as f64));
    }
    live.wait_for(|stats| stats.current_route.len() == 3)
        .await
        .unwrap();

    s.clock.set(T0 + 2_000);
    let session = s.tracker.stop().await.unwrap();

    let segment = metrics::haversine_distance(&GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.0, 0.001));
    assert!((session.distance_meters - 2.0 * segment).abs() / (2.0 * segment) < 0.01);
    assert_eq!(session.duration_millis, 2_000);
    assert_eq!(session.route.len(), 3);
    assert_eq!(session.max_speed_mps, 4.0);

    let stored = s.store.get(&id).unwrap().unwrap();
    assert_eq!(stored, session);
    assert_eq!(s.tracker.state(), RunState::Idle);
    assert!(!s.tracker.live_stats().is_running);
}

#[tokio::test(start_paused = true)]
async fn corrupt_fix_does_not_poison_run() {
    let s = setup();
    let mut live = s.tracker.subscribe_live();
    let id = s.tracker.start().unwrap();

    s.source.push(GeoSample::new(0.0, 0.0, T0));
    s.source.push(GeoSample::new(f64::NAN, 0.0, T0 + 500));
    s.source.push(GeoSample::new(0.0, 0.001, T0 + 1_000));
    live.wait_for(|stats| stats.current_route.len() == 2)
        .await
        .unwrap();
    assert!(live.borrow().current_distance.is_finite());

    s.clock.set(T0 + 1_000);
    let session = s.tracker.stop().await.unwrap();
    assert!(session.distance_meters > 100.0);
    assert_eq!(s.store.require(&id).unwrap().route.len(), 2);
}

// ============================================================================
// Test: Pause / Resume
// ============================================================================

#[tokio::test(start_paused = true)]
async fn pause_resume_accounting() {
    let s = setup();
    s.tracker.start().unwrap();
    assert_eq!(s.source.subscriber_count(), 1);

    s.clock.set(T0 + 5_000);
    assert!(s.tracker.pause());
    assert!(s.tracker.live_stats().is_paused);
    assert!(s.tracker.live_stats().is_running);

    // Pausing cancels the subscription
    settle().await;
    assert_eq!(s.source.subscriber_count(), 0);
    assert_eq!(s.source.push(GeoSample::new(1.0, 1.0, T0 + 6_000)), 0);
    assert!(!s.tracker.pause());

    s.clock.set(T0 + 10_000);
    assert!(s.tracker.resume().unwrap());
    assert!(!s.tracker.resume().unwrap());
    settle().await;
    assert_eq!(s.source.subscriber_count(), 1);

    s.clock.set(T0 + 15_000);
    let session = s.tracker.stop().await.unwrap();
    assert_eq!(session.duration_millis, 10_000);
    assert!(session.route.is_empty());

    settle().await;
    assert_eq!(s.source.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_are_noops_when_not_applicable() {
    let s = setup();
    assert!(!s.tracker.pause());
    assert!(!s.tracker.resume().unwrap());
    assert_eq!(s.tracker.state(), RunState::Idle);

    s.tracker.start().unwrap();
    assert!(!s.tracker.resume().unwrap());
    assert_eq!(s.tracker.state(), RunState::Running);
}

// ============================================================================
// Test: Edge Cases
// ============================================================================

#[tokio::test(start_paused = true)]
async fn empty_run_is_saved() {
    let s = setup();
    s.tracker.start().unwrap();
    s.clock.set(T0 + 30 * 60_000);

    let session = s.tracker.stop().await.unwrap();
    assert_eq!(session.distance_meters, 0.0);
    assert_eq!(session.avg_pace_min_per_km, 0.0);
    assert_eq!(session.max_speed_mps, 0.0);
    assert_eq!(session.calories, 280);

    let stats = s.store.statistics().unwrap();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.total_calories, 280);
    assert_eq!(stats.best_pace, 0.0);
}

#[tokio::test(start_paused = true)]
async fn second_stop_is_rejected() {
    let s = setup();
    s.tracker.start().unwrap();
    s.clock.set(T0 + 1_000);

    s.tracker.stop().await.unwrap();
    assert!(matches!(s.tracker.stop().await, Err(TrackerError::NotActive)));
    assert_eq!(s.store.session_count().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn consecutive_runs_get_distinct_ids() {
    let s = setup();
    let first = s.tracker.start().unwrap();
    s.clock.set(T0 + 1_000);
    s.tracker.stop().await.unwrap();

    s.clock.set(T0 + 60_000);
    let second = s.tracker.start().unwrap();
    s.clock.set(T0 + 61_000);
    s.tracker.stop().await.unwrap();

    assert_ne!(first, second);
    let ids: Vec<String> = s
        .store
        .query(&SessionQuery::All)
        .unwrap()
        .into_iter()
        .map(|session| session.id)
        .collect();
    assert_eq!(ids, vec![second, first]);
}

// ============================================================================
// Test: Save Failure
// ============================================================================

/// Store whose writes always fail.
struct ReadOnlyStore;

impl SessionStore for ReadOnlyStore {
    fn append(&self, _session: &RunSession) -> Result<()> {
        Err(TrackerError::Persistence {
            message: "attempt to write a readonly database".to_string(),
        })
    }

    fn update(&self, session: &RunSession) -> Result<()> {
        self.append(session)
    }

    fn get(&self, _id: &str) -> Result<Option<RunSession>> {
        Ok(None)
    }

    fn query(&self, _query: &SessionQuery) -> Result<Vec<RunSession>> {
        Ok(Vec::new())
    }

    fn delete(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    fn delete_all(&self) -> Result<()> {
        Ok(())
    }

    fn delete_older_than(&self, _cutoff_millis: i64) -> Result<u32> {
        Ok(0)
    }

    fn statistics(&self) -> Result<AggregateStatistics> {
        Ok(AggregateStatistics::default())
    }

    fn longest_run(&self) -> Result<Option<RunSession>> {
        Ok(None)
    }

    fn fastest_run(&self) -> Result<Option<RunSession>> {
        Ok(None)
    }

    fn session_count(&self) -> Result<u32> {
        Ok(0)
    }
}

#[tokio::test(start_paused = true)]
async fn save_failure_still_goes_idle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let source = Arc::new(ChannelLocationSource::new());
    let clock = Arc::new(ManualClock::new(T0));
    let tracker = RunTracker::new(
        TrackerConfig::default(),
        source.clone(),
        Arc::new(ReadOnlyStore),
        clock.clone(),
    )
    .unwrap();

    let id = tracker.start().unwrap();
    source.push(GeoSample::new(0.0, 0.0, T0));
    clock.set(T0 + 60_000);

    let err = tracker.stop().await.unwrap_err();
    assert!(err.to_string().contains(&id));
    let TrackerError::SaveFailed { session, .. } = err else {
        panic!("expected SaveFailed");
    };
    assert_eq!(session.duration_millis, 60_000);
    assert_eq!(session.end_time, T0 + 60_000);

    assert_eq!(tracker.state(), RunState::Idle);
    assert_eq!(tracker.live_stats().current_duration, 0);
    settle().await;
    assert_eq!(source.subscriber_count(), 0);
}
