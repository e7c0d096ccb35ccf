//! Tracker configuration
//!
//! Every field has a default from `lib.rs`; JSON config files only need to
//! name the values they change.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{AggregationMode, MarkerError};
use crate::{
    DEFAULT_DETECTION_COOLDOWN, DEFAULT_DISTANCE_THRESHOLD_METERS, DEFAULT_HISTORY_SECONDS,
    DEFAULT_IQR_OUTLIER_K, DEFAULT_LOST_TIMEOUT, DEFAULT_MIN_LOCKED_MARKERS,
    DEFAULT_MIN_OBSERVATIONS_PER_UUID, DEFAULT_ORIENTATION_BLEND, DEFAULT_RETRY_DELAY_SECONDS,
    DEFAULT_SCAN_DURATION, DEFAULT_TRUST_HYSTERESIS, DEFAULT_TRUST_LOW_THRESHOLD,
};

/// Tunables for all subsystems of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds after a Lost during which re-entry does not re-fire Detected
    pub detection_cooldown: f64,
    /// Seconds of absence before Lost fires
    pub lost_timeout: f64,
    /// Scan window length (seconds)
    pub scan_duration: f64,
    /// Rolling history length for live smoothing (seconds)
    pub history_seconds: f64,
    /// IQR fence multiplier
    pub iqr_outlier_k: f64,
    /// Slerp factor toward the latest orientation in live follow
    pub orientation_blend: f64,
    pub aggregation_mode: AggregationMode,
    /// Fewer collected ids than this fails the scan
    pub min_locked_markers: usize,
    pub auto_retry_on_fail: bool,
    pub retry_delay_seconds: f64,
    /// Enter gameplay as soon as the layout is locked and trust is acceptable
    pub auto_begin_gameplay: bool,
    /// Re-engage a locked marker after a hit when it is detected again
    pub respawn_on_redetect: bool,
    /// Co-visibility radius during setup (meters)
    pub distance_threshold_meters: f64,
    pub min_observations_per_uuid: u32,
    pub trust_low_threshold: f64,
    pub trust_hysteresis: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_cooldown: DEFAULT_DETECTION_COOLDOWN,
            lost_timeout: DEFAULT_LOST_TIMEOUT,
            scan_duration: DEFAULT_SCAN_DURATION,
            history_seconds: DEFAULT_HISTORY_SECONDS,
            iqr_outlier_k: DEFAULT_IQR_OUTLIER_K,
            orientation_blend: DEFAULT_ORIENTATION_BLEND,
            aggregation_mode: AggregationMode::ScanThenLock,
            min_locked_markers: DEFAULT_MIN_LOCKED_MARKERS,
            auto_retry_on_fail: true,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECONDS,
            auto_begin_gameplay: true,
            respawn_on_redetect: true,
            distance_threshold_meters: DEFAULT_DISTANCE_THRESHOLD_METERS,
            min_observations_per_uuid: DEFAULT_MIN_OBSERVATIONS_PER_UUID,
            trust_low_threshold: DEFAULT_TRUST_LOW_THRESHOLD,
            trust_hysteresis: DEFAULT_TRUST_HYSTERESIS,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, MarkerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MarkerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), MarkerError> {
        non_negative("detection_cooldown", self.detection_cooldown)?;
        positive("lost_timeout", self.lost_timeout)?;
        positive("scan_duration", self.scan_duration)?;
        positive("history_seconds", self.history_seconds)?;
        non_negative("iqr_outlier_k", self.iqr_outlier_k)?;
        unit_interval("orientation_blend", self.orientation_blend)?;
        non_negative("retry_delay_seconds", self.retry_delay_seconds)?;
        positive("distance_threshold_meters", self.distance_threshold_meters)?;
        unit_interval("trust_low_threshold", self.trust_low_threshold)?;
        unit_interval("trust_hysteresis", self.trust_hysteresis)?;

        if self.min_observations_per_uuid == 0 {
            return Err(invalid("min_observations_per_uuid", "must be at least 1"));
        }
        if self.min_locked_markers == 0 {
            return Err(invalid("min_locked_markers", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> MarkerError {
    MarkerError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), MarkerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be > 0, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), MarkerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be >= 0, got {}", value)))
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), MarkerError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {}", value)))
    }
}
