//! # Run Sessions
//!
//! Session records and the synchronous run state machine.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!   ^                |                  |
//!   +------stop------+-------stop-------+
//! ```
//!
//! [`RunStateMachine`] owns the sample buffer and the live statistics of
//! the single active run. It never reads the clock itself: every operation
//! receives `now` in Unix milliseconds, which keeps it deterministic and
//! lets the async [`crate::RunTracker`] drive it from both the location
//! stream and the periodic tick through one reducer ([`RunStateMachine::apply`]).

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::{metrics, Bounds, GeoSample, GpsPoint};

// ============================================================================
// Records
// ============================================================================

/// One run, from start to stop.
///
/// `end_time` is 0 while the run is active. Once it is set the session is
/// finished and no longer changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSession {
    pub id: String,
    /// Unix milliseconds
    pub start_time: i64,
    /// Unix milliseconds, 0 while active
    pub end_time: i64,
    pub distance_meters: f64,
    /// Active time, pauses excluded
    pub duration_millis: i64,
    pub avg_pace_min_per_km: f64,
    pub max_speed_mps: f64,
    pub calories: u32,
    pub route: Vec<GpsPoint>,
}

impl RunSession {
    /// A freshly started session with no samples.
    pub fn started(id: String, start_time: i64) -> Self {
        Self {
            id,
            start_time,
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time == 0 && self.start_time > 0
    }

    /// Average speed in m/s over the active duration.
    pub fn average_speed(&self) -> f64 {
        metrics::speed(self.distance_meters, self.duration_millis)
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_millis / 1000
    }

    /// Bounding box of the route, for fitting a map camera.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.route)
    }

    /// Center of the route's bounding box, where a map camera should look.
    pub fn map_center(&self) -> Option<GpsPoint> {
        self.bounds().map(|b| b.center())
    }
}

/// Live statistics of the active run, republished on every sample and tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    pub current_distance: f64,
    pub current_duration: i64,
    pub current_pace: f64,
    /// Speed of the latest sample, m/s
    pub current_speed: f64,
    pub current_location: Option<GpsPoint>,
    pub current_route: Vec<GpsPoint>,
    /// True while a run is active, paused or not
    pub is_running: bool,
    pub is_paused: bool,
    /// Location permission is missing; the run records no samples
    pub location_permission_denied: bool,
}

/// State of the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

/// Input to the live-stats reducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// A position fix arrived from the location stream
    Sample(GeoSample),
    /// The periodic recompute tick fired
    Tick,
}

// ============================================================================
// State Machine
// ============================================================================

/// The run state machine.
///
/// Subscriptions are identified by an epoch that changes on every start,
/// pause, resume and stop. Triggers tagged with an older epoch come from a
/// cancelled subscription and are dropped.
#[derive(Debug)]
pub struct RunStateMachine {
    config: TrackerConfig,
    state: RunState,
    session: RunSession,
    samples: Vec<GeoSample>,
    paused_at: Option<i64>,
    total_paused_millis: i64,
    epoch: u64,
    live: LiveStats,
}

impl RunStateMachine {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
            session: RunSession::default(),
            samples: Vec::new(),
            paused_at: None,
            total_paused_millis: 0,
            epoch: 0,
            live: LiveStats::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current subscription epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn live_stats(&self) -> &LiveStats {
        &self.live
    }

    /// The session being recorded (default while idle).
    pub fn current_session(&self) -> &RunSession {
        &self.session
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn set_permission_denied(&mut self, denied: bool) {
        self.live.location_permission_denied = denied;
    }

    /// Show `point` as the current location without recording it.
    pub fn seed_location(&mut self, point: GpsPoint) {
        if self.state != RunState::Idle && self.live.current_location.is_none() {
            self.live.current_location = Some(point);
        }
    }

    /// Begin a new run. Returns the epoch of the new subscription.
    pub fn start(&mut self, id: String, now: i64) -> Result<u64> {
        if self.state != RunState::Idle {
            return Err(TrackerError::AlreadyActive);
        }

        self.session = RunSession::started(id, now);
        self.samples.clear();
        self.paused_at = None;
        self.total_paused_millis = 0;
        self.state = RunState::Running;
        self.live = LiveStats {
            is_running: true,
            is_paused: false,
            location_permission_denied: self.live.location_permission_denied,
            ..Default::default()
        };
        Ok(self.next_epoch())
    }

    /// Pause a running session. Returns false (and does nothing) otherwise.
    pub fn pause(&mut self, now: i64) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.paused_at = Some(now);
        self.state = RunState::Paused;
        self.live.is_paused = true;
        self.next_epoch();
        true
    }

    /// Resume a paused session. Returns the new subscription epoch, or
    /// `None` (doing nothing) if the session was not paused.
    pub fn resume(&mut self, now: i64) -> Option<u64> {
        if self.state != RunState::Paused {
            return None;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused_millis += (now - paused_at).max(0);
        }
        self.state = RunState::Running;
        self.live.is_paused = false;
        Some(self.next_epoch())
    }

    /// Finish the active run and return it. Returns `None` when idle.
    ///
    /// Live state is reset to its idle defaults and the sample buffer is
    /// cleared.
    pub fn stop(&mut self, now: i64) -> Option<RunSession> {
        if self.state == RunState::Idle {
            return None;
        }

        let duration = self.active_duration(now);
        let distance = metrics::distance(&self.samples);

        let mut finished = std::mem::take(&mut self.session);
        finished.end_time = now;
        finished.duration_millis = duration;
        finished.distance_meters = distance;
        finished.avg_pace_min_per_km = metrics::pace(distance, duration);
        finished.calories =
            metrics::calories_with_met(duration, self.config.body_weight_kg, self.config.met);
        finished.max_speed_mps = metrics::max_speed(&self.samples);
        finished.route = self.samples.iter().map(|s| s.point()).collect();

        self.state = RunState::Idle;
        self.samples.clear();
        self.paused_at = None;
        self.total_paused_millis = 0;
        self.live = LiveStats {
            location_permission_denied: self.live.location_permission_denied,
            ..Default::default()
        };
        self.next_epoch();

        Some(finished)
    }

    /// Feed a trigger from subscription `epoch` into the reducer.
    ///
    /// Returns true if the live stats changed. Triggers are ignored unless
    /// the machine is running and `epoch` is current. Fixes with
    /// non-finite or out-of-range coordinates are dropped.
    pub fn apply(&mut self, epoch: u64, trigger: Trigger, now: i64) -> bool {
        if self.state != RunState::Running || epoch != self.epoch {
            return false;
        }
        if let Trigger::Sample(sample) = trigger {
            if !sample.point().is_valid() {
                debug!(
                    "[RunTracker] Dropping invalid fix ({}, {}) at {}",
                    sample.latitude, sample.longitude, sample.timestamp_millis
                );
                return false;
            }
            self.samples.push(sample);
        }
        self.recompute(now);
        true
    }

    /// Rebuild the live stats from the full sample buffer.
    fn recompute(&mut self, now: i64) {
        let duration = self.active_duration(now);
        let distance = metrics::distance(&self.samples);
        let last = self.samples.last();

        self.live.current_distance = distance;
        self.live.current_duration = duration;
        self.live.current_pace = metrics::pace(distance, duration);
        self.live.current_speed = last.map(|s| s.speed).unwrap_or(0.0);
        if let Some(sample) = last {
            self.live.current_location = Some(sample.point());
        }
        self.live.current_route = self.samples.iter().map(|s| s.point()).collect();
    }

    /// Time spent running since start, excluding every pause so far
    /// (including one still open).
    fn active_duration(&self, now: i64) -> i64 {
        let open_pause = self.paused_at.map(|p| (now - p).max(0)).unwrap_or(0);
        (now - self.session.start_time - self.total_paused_millis - open_pause).max(0)
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }
}
