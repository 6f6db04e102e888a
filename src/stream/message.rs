//! Wire message: one JSON text frame per accepted, non-frozen tracker frame.
//!
//! ```json
//! {
//!   "rotation": [[r00, r01, r02], [r10, r11, r12], [r20, r21, r22]],
//!   "position": [x, y, z],
//!   "toggle": false,
//!   "button": false
//! }
//! ```
//!
//! `rotation` holds the rows of the calibrated rotation matrix. `position` is
//! the calibrated position with the freeze offset already removed. There is no
//! version field, sequence number or timestamp.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::tracking::{ControlFlags, Pose};

use super::error::StreamError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMessage {
    pub rotation: [[f64; 3]; 3],
    pub position: [f64; 3],
    pub toggle: bool,
    pub button: bool,
}

impl PoseMessage {
    pub fn new(pose: &Pose, flags: ControlFlags) -> Self {
        let r = &pose.rotation;
        Self {
            rotation: [
                [r[(0, 0)], r[(0, 1)], r[(0, 2)]],
                [r[(1, 0)], r[(1, 1)], r[(1, 2)]],
                [r[(2, 0)], r[(2, 1)], r[(2, 2)]],
            ],
            position: [pose.position.x, pose.position.y, pose.position.z],
            toggle: flags.toggle,
            button: flags.button,
        }
    }

    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StreamError> {
        Ok(serde_json::from_str(text)?)
    }

    #[rustfmt::skip]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = &self.rotation;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2],
            r[1][0], r[1][1], r[1][2],
            r[2][0], r[2][1], r[2][2],
        )
    }

    pub fn position_vector(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    pub fn flags(&self) -> ControlFlags {
        ControlFlags {
            toggle: self.toggle,
            button: self.button,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn sample_pose() -> Pose {
        Pose {
            rotation: *Rotation3::from_euler_angles(0.2, -0.4, 1.0).matrix(),
            position: Vector3::new(0.125, -3.5, 7.25),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let pose = sample_pose();
        let flags = ControlFlags {
            toggle: true,
            button: false,
        };
        let json = PoseMessage::new(&pose, flags).to_json().unwrap();
        let parsed = PoseMessage::from_json(&json).unwrap();

        assert_eq!(parsed.rotation_matrix(), pose.rotation);
        assert_eq!(parsed.position_vector(), pose.position);
        assert_eq!(parsed.flags(), flags);
    }

    #[test]
    fn test_rotation_is_row_major() {
        let pose = Pose {
            rotation: Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0),
            position: Vector3::zeros(),
        };
        let msg = PoseMessage::new(&pose, ControlFlags::default());

        assert_eq!(msg.rotation[0], [1.0, 2.0, 3.0]);
        assert_eq!(msg.rotation[2], [7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_field_names_on_the_wire() {
        let msg = PoseMessage::new(
            &Pose::identity(),
            ControlFlags {
                toggle: false,
                button: true,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 4);
        assert_eq!(value["rotation"][1][1], 1.0);
        assert_eq!(value["position"].as_array().unwrap().len(), 3);
        assert_eq!(value["toggle"], false);
        assert_eq!(value["button"], true);
    }

    #[test]
    fn test_non_finite_position_fails_to_decode() {
        // serde_json writes NaN as null, which the reference decoder rejects.
        let pose = Pose {
            rotation: Matrix3::identity(),
            position: Vector3::new(f64::NAN, 0.0, 0.0),
        };
        let json = PoseMessage::new(&pose, ControlFlags::default()).to_json().unwrap();

        assert!(matches!(
            PoseMessage::from_json(&json),
            Err(StreamError::Serialize(_))
        ));
    }
}
