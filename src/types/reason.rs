//! Reason codes for lifecycle events, lock outcomes, trust changes and refusals

use serde::{Deserialize, Serialize};

/// Reason codes attached to log lines and refusals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Lifecycle
    // =========================================================================
    /// First sighting of an id
    R101_MARKER_DETECTED,
    /// Re-entry within the cooldown, Detected deferred
    R102_DETECTION_DEFERRED,
    /// Absent longer than the lost timeout
    R103_MARKER_LOST,
    /// Observation failed validation and was dropped
    R104_OBSERVATION_DROPPED,

    // =========================================================================
    // R2xx: Aggregation
    // =========================================================================
    /// Scan window opened
    R201_SCAN_STARTED,
    /// Robust pose frozen for an id
    R202_POSE_LOCKED,
    /// Scan window closed with too few markers
    R203_LOCK_FAILED,
    /// Partial scan discarded, window restarted
    R204_SCAN_RESTARTED,
    /// Marker placed in live-follow mode
    R205_MARKER_PLACED,

    // =========================================================================
    // R3xx: Trust
    // =========================================================================
    /// Published trust moved beyond the hysteresis band
    R301_TRUST_CHANGED,
    /// Published trust below the low threshold
    R302_TRUST_LOW,
    /// No eligible known sets, trust forced to 0
    R303_NO_ELIGIBLE_SETS,
    /// Engaged marker lost, counted as a hit
    R304_HIT_SUCCESS,

    // =========================================================================
    // R4xx: Control and configuration
    // =========================================================================
    /// Control call not allowed in the current mode
    R401_TRANSITION_REJECTED,
    /// Configuration value out of range
    R402_CONFIG_INVALID,
    /// Observation source absent, subsystem disabled
    R403_SOURCE_MISSING,

    // =========================================================================
    // R5xx: Snapshot
    // =========================================================================
    /// Snapshot requested before poses were locked
    R501_SNAPSHOT_NOT_LOCKED,
    /// Snapshot file could not be read or written
    R502_SNAPSHOT_IO_FAILED,
    /// Stored fingerprint does not match the content
    R503_SNAPSHOT_FINGERPRINT_MISMATCH,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R101_MARKER_DETECTED => "R101_MARKER_DETECTED",
            Self::R102_DETECTION_DEFERRED => "R102_DETECTION_DEFERRED",
            Self::R103_MARKER_LOST => "R103_MARKER_LOST",
            Self::R104_OBSERVATION_DROPPED => "R104_OBSERVATION_DROPPED",
            Self::R201_SCAN_STARTED => "R201_SCAN_STARTED",
            Self::R202_POSE_LOCKED => "R202_POSE_LOCKED",
            Self::R203_LOCK_FAILED => "R203_LOCK_FAILED",
            Self::R204_SCAN_RESTARTED => "R204_SCAN_RESTARTED",
            Self::R205_MARKER_PLACED => "R205_MARKER_PLACED",
            Self::R301_TRUST_CHANGED => "R301_TRUST_CHANGED",
            Self::R302_TRUST_LOW => "R302_TRUST_LOW",
            Self::R303_NO_ELIGIBLE_SETS => "R303_NO_ELIGIBLE_SETS",
            Self::R304_HIT_SUCCESS => "R304_HIT_SUCCESS",
            Self::R401_TRANSITION_REJECTED => "R401_TRANSITION_REJECTED",
            Self::R402_CONFIG_INVALID => "R402_CONFIG_INVALID",
            Self::R403_SOURCE_MISSING => "R403_SOURCE_MISSING",
            Self::R501_SNAPSHOT_NOT_LOCKED => "R501_SNAPSHOT_NOT_LOCKED",
            Self::R502_SNAPSHOT_IO_FAILED => "R502_SNAPSHOT_IO_FAILED",
            Self::R503_SNAPSHOT_FINGERPRINT_MISMATCH => "R503_SNAPSHOT_FINGERPRINT_MISMATCH",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R101_MARKER_DETECTED => "Marker detected",
            Self::R102_DETECTION_DEFERRED => "Re-entry inside cooldown, detection deferred",
            Self::R103_MARKER_LOST => "Marker lost after timeout",
            Self::R104_OBSERVATION_DROPPED => "Malformed observation dropped",
            Self::R201_SCAN_STARTED => "Scan window started",
            Self::R202_POSE_LOCKED => "Pose locked",
            Self::R203_LOCK_FAILED => "Lock failed - too few markers collected",
            Self::R204_SCAN_RESTARTED => "Scan restarted",
            Self::R205_MARKER_PLACED => "Marker placed (live follow)",
            Self::R301_TRUST_CHANGED => "Trust changed",
            Self::R302_TRUST_LOW => "Trust below threshold",
            Self::R303_NO_ELIGIBLE_SETS => "No eligible known sets",
            Self::R304_HIT_SUCCESS => "Engaged marker hit",
            Self::R401_TRANSITION_REJECTED => "Transition not allowed in current mode",
            Self::R402_CONFIG_INVALID => "Invalid configuration",
            Self::R403_SOURCE_MISSING => "Observation source missing",
            Self::R501_SNAPSHOT_NOT_LOCKED => "Layout not locked yet",
            Self::R502_SNAPSHOT_IO_FAILED => "Snapshot I/O failed",
            Self::R503_SNAPSHOT_FINGERPRINT_MISMATCH => "Snapshot fingerprint mismatch",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
