//! Display formatting for run values.
//!
//! Dates and clock times use the local timezone.

use chrono::{DateTime, Local, TimeZone};

/// Elapsed time as `MM:SS`, or `HH:MM:SS` from one hour up.
pub fn format_time(millis: i64) -> String {
    let total_secs = millis.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Distance as `"850 m"` below one kilometer, `"1.23 km"` from there.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}

/// Pace in min/km as `m:ss`, or `--:--` when there is no meaningful pace.
pub fn format_pace(pace: f64) -> String {
    if !pace.is_finite() || pace <= 0.0 {
        return "--:--".to_string();
    }
    let total_secs = (pace * 60.0).round() as u64;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Speed in m/s shown as km/h with one decimal.
pub fn format_speed(speed_mps: f64) -> String {
    format!("{:.1} km/h", speed_mps * 3.6)
}

pub fn format_calories(calories: u32) -> String {
    format!("{} cal", calories)
}

/// Calendar date, e.g. `"May 15, 2024"`.
pub fn format_date(timestamp_millis: i64) -> String {
    local(timestamp_millis)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_default()
}

/// Wall-clock time of day, e.g. `"07:42"`.
pub fn format_clock(timestamp_millis: i64) -> String {
    local(timestamp_millis)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `"07:42 - 08:15"`
pub fn format_time_range(start_millis: i64, end_millis: i64) -> String {
    format!("{} - {}", format_clock(start_millis), format_clock(end_millis))
}

fn local(timestamp_millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(timestamp_millis).earliest()
}
