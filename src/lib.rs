//! markerlock: stable layouts and trust scores from unreliable marker detections
//!
//! Tick pipeline: observations → MarkerLifecycleTracker → {PoseAggregator, TrustMonitor, HitDetectionPipeline}

pub mod core;
pub mod logger;
pub mod types;

// =============================================================================
// LIFECYCLE [s] - debounce timing
// =============================================================================

/// Re-entry window after a loss during which a new Detected is deferred (seconds)
pub const DEFAULT_DETECTION_COOLDOWN: f64 = 0.5;

/// Absence longer than this fires Lost (seconds)
pub const DEFAULT_LOST_TIMEOUT: f64 = 1.0;

// =============================================================================
// AGGREGATION
// =============================================================================

/// Length of the scan window before poses are locked (seconds)
pub const DEFAULT_SCAN_DURATION: f64 = 10.0;

/// Rolling pose history used for live smoothing (seconds)
pub const DEFAULT_HISTORY_SECONDS: f64 = 5.0;

/// Tukey fence multiplier for IQR outlier rejection
pub const DEFAULT_IQR_OUTLIER_K: f64 = 1.5;

/// Slerp factor toward the latest orientation in live-follow smoothing
pub const DEFAULT_ORIENTATION_BLEND: f64 = 0.2;

/// Below this many samples the robust mean degrades to the plain mean
pub const MIN_SAMPLES_FOR_IQR: usize = 3;

/// Scan windows that collected fewer ids than this fail
pub const DEFAULT_MIN_LOCKED_MARKERS: usize = 1;

/// Delay before an automatic retry after a failed lock (seconds)
pub const DEFAULT_RETRY_DELAY_SECONDS: f64 = 2.0;

// =============================================================================
// TRUST
// =============================================================================

/// Max distance for two ids to count as co-visible during setup (meters)
pub const DEFAULT_DISTANCE_THRESHOLD_METERS: f64 = 1.0;

/// Setup observations an id needs before its known set is scored
pub const DEFAULT_MIN_OBSERVATIONS_PER_UUID: u32 = 3;

/// Published trust below this raises TrustLow
pub const DEFAULT_TRUST_LOW_THRESHOLD: f64 = 0.5;

/// Minimum change before a new trust value is published
pub const DEFAULT_TRUST_HYSTERESIS: f64 = 0.01;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
