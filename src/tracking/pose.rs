//! Calibrated pose and the auxiliary control signals sent alongside it.

use nalgebra::{Matrix3, Vector3};

use crate::geometry::{Transform, from_parts};

/// Orientation and position in the calibrated reference frame.
///
/// Created once per accepted frame, handed to observers and the stream
/// channel, then dropped. No history is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub position: Vector3<f64>,
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            position: Vector3::zeros(),
        }
    }

    /// The pose as a homogeneous 4×4 transform (what the matrix readout shows).
    pub fn to_homogeneous(&self) -> Transform {
        from_parts(&self.rotation, &self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Snapshot of the two operator controls at the time a message is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFlags {
    /// Latched state of the toggle control.
    pub toggle: bool,
    /// Momentary control; true while held.
    pub button: bool,
}
