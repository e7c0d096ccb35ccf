//! Geometry primitives shared by every subsystem
//!
//! Positions are meters in a y-up world frame.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// World position in meters
pub type Position = Vector3<f64>;

/// Normalized orientation
pub type Orientation = UnitQuaternion<f64>;

/// A 6-DOF pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self { position, orientation }
    }

    /// Pose at `position` with identity orientation
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// Height along the world up axis
    pub fn height(&self) -> f64 {
        self.position.y
    }

    /// Euclidean distance between the two positions
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.position - other.position).norm()
    }

    /// Short form for terminal output
    pub fn describe(&self) -> String {
        let (roll, pitch, yaw) = self.orientation.euler_angles();
        format!(
            "({:.3}, {:.3}, {:.3}) rpy=({:.1}°, {:.1}°, {:.1}°)",
            self.position.x,
            self.position.y,
            self.position.z,
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees()
        )
    }
}
