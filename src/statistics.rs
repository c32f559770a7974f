//! Aggregate statistics over the stored session history.
//!
//! The record is re-aggregated by the store after every write, so readers
//! never see totals that disagree with the session table.

use chrono::{Datelike, Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// Totals and bests across all stored sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub total_runs: u32,
    /// Meters
    pub total_distance: f64,
    /// Milliseconds
    pub total_duration: i64,
    pub total_calories: u64,
    /// Mean of `avg_pace_min_per_km` over sessions with a non-zero pace
    pub average_pace: f64,
    /// Lowest (fastest) non-zero pace
    pub best_pace: f64,
    /// Longest distance of a single run, meters
    pub longest_run: f64,
    /// Longest duration of a single run, milliseconds
    pub longest_duration: i64,
    /// When the aggregate was computed, Unix milliseconds
    pub last_updated: i64,
}

impl AggregateStatistics {
    pub fn is_empty(&self) -> bool {
        self.total_runs == 0
    }

    /// Mean distance per run in meters.
    pub fn average_distance(&self) -> f64 {
        if self.total_runs == 0 {
            return 0.0;
        }
        self.total_distance / self.total_runs as f64
    }
}

/// Start of the local calendar week (Monday 00:00) containing `now_millis`.
pub fn week_start_millis(now_millis: i64) -> i64 {
    let today = local_date(now_millis);
    let offset = today.weekday().num_days_from_monday() as u64;
    let monday = today.checked_sub_days(Days::new(offset)).unwrap_or(today);
    local_midnight_millis(monday).unwrap_or(now_millis)
}

/// Start of the local calendar month (1st, 00:00) containing `now_millis`.
pub fn month_start_millis(now_millis: i64) -> i64 {
    let today = local_date(now_millis);
    let first = today.with_day(1).unwrap_or(today);
    local_midnight_millis(first).unwrap_or(now_millis)
}

fn local_date(millis: i64) -> NaiveDate {
    Local
        .timestamp_millis_opt(millis)
        .earliest()
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Local::now().date_naive())
}

fn local_midnight_millis(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
