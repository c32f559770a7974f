//! # Rush Tracker
//!
//! GPS run tracking core for a mobile running app.
//!
//! This library provides:
//! - A live run state machine (start / pause / resume / stop) fed by a
//!   location stream and a one-second tick
//! - Run metrics: haversine distance, pace, speed and MET-based calories
//! - SQLite-backed session history with aggregate statistics
//!
//! ## Features
//!
//! - **`persistence`** (default) - Enable the SQLite session store
//!
//! ## Quick Start
//!
//! ```rust
//! use rush_tracker::{metrics, GeoSample};
//!
//! let samples = vec![
//!     GeoSample::new(0.0, 0.0, 0),
//!     GeoSample::new(0.0, 0.001, 1_000),
//!     GeoSample::new(0.0, 0.002, 2_000),
//! ];
//!
//! let distance = metrics::distance(&samples);
//! let pace = metrics::pace(distance, 2_000);
//! println!("{:.0} m at {:.2} min/km", distance, pace);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackerError};

// Tracker and store configuration
pub mod config;
pub use config::{StoreConfig, TrackerConfig};

// Wall-clock abstraction (injectable for tests)
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Pure metric functions (distance, pace, speed, calories)
pub mod metrics;

// Session records and the run state machine
pub mod session;
pub use session::{LiveStats, RunSession, RunState, RunStateMachine};

// Aggregate statistics over session history
pub mod statistics;
pub use statistics::AggregateStatistics;

// Location source contract
pub mod location;
pub use location::{ChannelLocationSource, LocationSource};

// Session persistence gateway
pub mod store;
pub use store::{SessionQuery, SessionStore};
#[cfg(feature = "persistence")]
pub use store::SqliteSessionStore;

// Live tracker driving the state machine
pub mod tracker;
pub use tracker::RunTracker;

// Display formatting
pub mod format;

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RushTracker"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms; hosts install their own logger
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use rush_tracker::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One position fix delivered by the location source.
///
/// Samples are kept in arrival order, which is not necessarily timestamp order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Fix time, Unix milliseconds
    pub timestamp_millis: i64,
    /// Instantaneous speed reported by the receiver, m/s
    pub speed: f64,
    /// Horizontal accuracy radius, meters
    pub accuracy: f64,
}

impl GeoSample {
    /// Create a sample with zero speed and accuracy.
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_millis,
            speed: 0.0,
            accuracy: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
