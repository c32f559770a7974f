//! Run metric calculations.
//!
//! Pure, stateless functions over timestamped samples:
//! - Cumulative great-circle distance (haversine)
//! - Pace in minutes per kilometer
//! - Average speed
//! - MET-based calorie estimate
//!
//! Degenerate inputs (fewer than two samples, zero or negative distance or
//! duration) yield zero, never NaN or infinity.
//!
//! ## Example
//! ```rust
//! use rush_tracker::metrics::{calories, pace};
//!
//! // 5 km in 25 minutes
//! assert!((pace(5_000.0, 25 * 60_000) - 5.0).abs() < 1e-9);
//!
//! // One hour at the default MET and body weight
//! assert_eq!(calories(10_000.0, 3_600_000, 70.0), 560);
//! ```

use geo::{Distance, Haversine, Point};

use crate::config::DEFAULT_MET;
use crate::{GeoSample, GpsPoint};

const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    Haversine::distance(
        Point::new(p1.longitude, p1.latitude),
        Point::new(p2.longitude, p2.latitude),
    )
}

/// Total distance of a sample sequence in meters.
///
/// Sums consecutive pairs in buffer (arrival) order; samples are not sorted
/// by timestamp first.
pub fn distance(samples: &[GeoSample]) -> f64 {
    samples
        .windows(2)
        .map(|w| haversine_distance(&w[0].point(), &w[1].point()))
        .sum()
}

/// Pace in minutes per kilometer.
///
/// Returns 0.0 when either input is non-positive.
pub fn pace(distance_meters: f64, duration_millis: i64) -> f64 {
    if distance_meters.is_nan() || distance_meters <= 0.0 || duration_millis <= 0 {
        return 0.0;
    }
    let distance_km = distance_meters / 1000.0;
    let duration_minutes = duration_millis as f64 / MILLIS_PER_MINUTE;
    duration_minutes / distance_km
}

/// Average speed in m/s.
///
/// Returns 0.0 when either input is non-positive.
pub fn speed(distance_meters: f64, duration_millis: i64) -> f64 {
    if distance_meters.is_nan() || distance_meters <= 0.0 || duration_millis <= 0 {
        return 0.0;
    }
    distance_meters / (duration_millis as f64 / 1000.0)
}

/// Estimated energy expenditure in kcal at the running MET (8.0).
///
/// Linear in duration; `distance_meters` does not enter the estimate.
pub fn calories(_distance_meters: f64, duration_millis: i64, weight_kg: f64) -> u32 {
    calories_with_met(duration_millis, weight_kg, DEFAULT_MET)
}

/// Estimated energy expenditure in kcal: `met × weight × hours`, truncated.
pub fn calories_with_met(duration_millis: i64, weight_kg: f64, met: f64) -> u32 {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if duration_millis <= 0 || !valid(weight_kg) || !valid(met) {
        return 0;
    }
    let duration_hours = duration_millis as f64 / MILLIS_PER_HOUR;
    (met * weight_kg * duration_hours) as u32
}

/// Highest instantaneous speed reported by any sample, or 0.0.
pub fn max_speed(samples: &[GeoSample]) -> f64 {
    samples
        .iter()
        .map(|s| s.speed)
        .filter(|s| s.is_finite())
        .fold(0.0, f64::max)
}
