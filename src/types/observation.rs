//! Raw per-tick input from the external tracking source

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::Pose;

/// Quaternions shorter than this are treated as malformed
pub const MIN_QUATERNION_NORM: f64 = 1e-9;

/// One marker sighting as reported by the tracking source
///
/// `orientation` is raw `[x, y, z, w]` and may be unnormalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Stable marker id (e.g. decoded QR payload or anchor uuid)
    pub id: String,
    pub position: Vector3<f64>,
    pub orientation: Quaternion<f64>,
    /// Capture time reported by the source (seconds)
    #[serde(default)]
    pub timestamp: f64,
}

impl Observation {
    /// Observation with a normalized orientation
    pub fn new(id: impl Into<String>, pose: Pose, timestamp: f64) -> Self {
        Self {
            id: id.into(),
            position: pose.position,
            orientation: pose.orientation.into_inner(),
            timestamp,
        }
    }

    /// Observation at `(x, y, z)` with identity orientation
    pub fn at(id: impl Into<String>, x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self::new(id, Pose::at(x, y, z), timestamp)
    }

    /// Validated pose, or None when the observation is malformed
    pub fn pose(&self) -> Option<Pose> {
        if self.id.is_empty() {
            return None;
        }
        if !self.position.iter().all(|v| v.is_finite()) {
            return None;
        }
        if !self.orientation.coords.iter().all(|v| v.is_finite()) {
            return None;
        }
        let orientation = UnitQuaternion::try_new(self.orientation, MIN_QUATERNION_NORM)?;
        Some(Pose::new(self.position, orientation))
    }
}

/// All observations reported for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationBatch {
    /// Logical tick time (seconds)
    pub time: f64,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl ObservationBatch {
    pub fn new(time: f64, observations: Vec<Observation>) -> Self {
        Self { time, observations }
    }

    /// A tick with nothing visible
    pub fn empty(time: f64) -> Self {
        Self::new(time, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
