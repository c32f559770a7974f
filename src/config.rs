//! Tracker and store configuration.
//!
//! Both configs are plain structs with sensible defaults. They can be
//! deserialized from JSON so a host app can ship overrides without
//! recompiling; missing fields fall back to the defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Running MET value (moderate intensity).
pub const DEFAULT_MET: f64 = 8.0;

/// Body weight used for calorie estimates when the user has not set one.
pub const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;

/// Period of the live stats recompute tick.
pub const DEFAULT_TICK_MILLIS: u64 = 1000;

/// Configuration for the live run tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Period of the recompute tick while running, in milliseconds.
    /// Default: 1000
    pub tick_millis: u64,

    /// Body weight used for calorie estimation.
    /// Default: 70.0 kg
    pub body_weight_kg: f64,

    /// Metabolic equivalent used for calorie estimation.
    /// Default: 8.0
    pub met: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_millis: DEFAULT_TICK_MILLIS,
            body_weight_kg: DEFAULT_BODY_WEIGHT_KG,
            met: DEFAULT_MET,
        }
    }
}

impl TrackerConfig {
    /// Parse a config from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackerConfig =
            serde_json::from_str(json).map_err(|e| TrackerError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall the tick or produce negative calories.
    pub fn validate(&self) -> Result<()> {
        if self.tick_millis == 0 {
            return Err(TrackerError::Config {
                message: "tick_millis must be greater than 0".to_string(),
            });
        }
        if !(self.body_weight_kg.is_finite() && self.body_weight_kg > 0.0) {
            return Err(TrackerError::Config {
                message: format!("body_weight_kg must be positive, got {}", self.body_weight_kg),
            });
        }
        if !(self.met.is_finite() && self.met > 0.0) {
            return Err(TrackerError::Config {
                message: format!("met must be positive, got {}", self.met),
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Configuration for the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Days of history kept by `cleanup_old_sessions` when called with the
    /// configured value (0 = keep all).
    /// Default: 365
    pub retention_days: u32,

    /// Default number of sessions returned by a recent-sessions query.
    /// Default: 10
    pub recent_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            recent_limit: 10,
        }
    }
}
