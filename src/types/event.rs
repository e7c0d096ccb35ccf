//! Events produced by the tick pipeline

use serde::{Deserialize, Serialize};

use crate::types::{Pose, ReasonCode};

/// Everything the core tells the game-flow layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MarkerEvent {
    /// Id became visible
    Detected { id: String, pose: Pose },
    /// Id absent longer than the lost timeout
    Lost { id: String },
    /// Robust pose frozen after the scan window
    Locked { id: String, pose: Pose },
    /// Scan window closed with too few markers
    LockFailed { collected: usize },
    /// Live-follow placement on detection
    Placed { id: String, pose: Pose },
    /// Published trust moved beyond the hysteresis band
    TrustChanged { value: f64 },
    /// Published trust below the low threshold (level-triggered)
    TrustLow { value: f64 },
    /// An engaged marker was lost
    HitSuccess { id: String },
}

impl MarkerEvent {
    /// Marker id, for per-marker events
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Detected { id, .. }
            | Self::Lost { id }
            | Self::Locked { id, .. }
            | Self::Placed { id, .. }
            | Self::HitSuccess { id } => Some(id),
            Self::LockFailed { .. } | Self::TrustChanged { .. } | Self::TrustLow { .. } => None,
        }
    }

    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Detected { .. } => ReasonCode::R101_MARKER_DETECTED,
            Self::Lost { .. } => ReasonCode::R103_MARKER_LOST,
            Self::Locked { .. } => ReasonCode::R202_POSE_LOCKED,
            Self::LockFailed { .. } => ReasonCode::R203_LOCK_FAILED,
            Self::Placed { .. } => ReasonCode::R205_MARKER_PLACED,
            Self::TrustChanged { .. } => ReasonCode::R301_TRUST_CHANGED,
            Self::TrustLow { .. } => ReasonCode::R302_TRUST_LOW,
            Self::HitSuccess { .. } => ReasonCode::R304_HIT_SUCCESS,
        }
    }

    /// Event name as used in the wire format
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Detected { .. } => "Detected",
            Self::Lost { .. } => "Lost",
            Self::Locked { .. } => "Locked",
            Self::LockFailed { .. } => "LockFailed",
            Self::Placed { .. } => "Placed",
            Self::TrustChanged { .. } => "TrustChanged",
            Self::TrustLow { .. } => "TrustLow",
            Self::HitSuccess { .. } => "HitSuccess",
        }
    }
}

impl std::fmt::Display for MarkerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected { id, pose } => write!(f, "Detected({}) at {}", id, pose.describe()),
            Self::Lost { id } => write!(f, "Lost({})", id),
            Self::Locked { id, pose } => write!(f, "Locked({}) at {}", id, pose.describe()),
            Self::LockFailed { collected } => write!(f, "LockFailed(collected={})", collected),
            Self::Placed { id, pose } => write!(f, "Placed({}) at {}", id, pose.describe()),
            Self::TrustChanged { value } => write!(f, "TrustChanged({:.3})", value),
            Self::TrustLow { value } => write!(f, "TrustLow({:.3})", value),
            Self::HitSuccess { id } => write!(f, "HitSuccess({})", id),
        }
    }
}
