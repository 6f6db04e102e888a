//! Calibration store: the active reference frame and the accumulated freeze offset.
//!
//! Calibration captures the device's current (reoriented) transform and makes
//! it the new origin and identity orientation. Every later pose is measured
//! relative to it through its inverse:
//!
//! ```text
//! T_calibrated = T_reoriented * T_calibration⁻¹
//! ```
//!
//! The freeze offset is the drift accumulated across freeze/unfreeze cycles.
//! It is subtracted from every emitted position, and folded into the
//! calibration translation when a new calibration is captured so pending
//! drift is baked into the new reference frame instead of being lost.

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::Deserialize;
use tracing::{debug, info};

use crate::geometry::{Transform, rigid_inverse, rotation_of, translation_of};

use super::pose::Pose;

/// How the freeze offset is folded into a newly captured calibration.
///
/// The legacy app folds every offset axis into X. That looks like a slip for
/// a per-axis subtraction, but receivers in the field are tuned against it,
/// so it stays the default until the intended behavior is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetFold {
    /// All three offset axes are subtracted from the X translation component.
    #[default]
    XAxisOnly,
    /// Each offset axis is subtracted from the matching translation component.
    ///
    /// Calibrating and then reading the same frame gives the origin for any
    /// pending offset.
    PerAxis,
}

impl OffsetFold {
    /// Translation of the calibration transform after folding `offset` into it.
    pub fn apply(self, translation: &Vector3<f64>, offset: &Vector3<f64>) -> Vector3<f64> {
        match self {
            OffsetFold::PerAxis => translation - offset,
            OffsetFold::XAxisOnly => {
                let mut folded = *translation;
                folded.x -= offset.x;
                folded.x -= offset.y;
                folded.x -= offset.z;
                folded
            }
        }
    }
}

impl FromStr for OffsetFold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_axis" => Ok(OffsetFold::PerAxis),
            "x_axis_only" => Ok(OffsetFold::XAxisOnly),
            other => Err(format!(
                "unknown offset fold {:?} (expected per_axis or x_axis_only)",
                other
            )),
        }
    }
}

impl fmt::Display for OffsetFold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetFold::PerAxis => write!(f, "per_axis"),
            OffsetFold::XAxisOnly => write!(f, "x_axis_only"),
        }
    }
}

/// A calibration transform together with its cached inverse.
///
/// Replaced as a whole, so readers never see a transform paired with a stale
/// inverse.
#[derive(Debug, Clone, Copy)]
struct Calibration {
    transform: Transform,
    inverse: Transform,
}

impl Calibration {
    fn new(transform: Transform) -> Self {
        Self {
            transform,
            inverse: rigid_inverse(&transform),
        }
    }
}

/// Holds the active calibration and the freeze offset.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    active: Calibration,
    freeze_offset: Vector3<f64>,
    fold: OffsetFold,
    /// Number of calibrations captured so far.
    calibrations: u64,
}

impl CalibrationStore {
    /// Identity calibration, zero offset, nothing captured yet.
    pub fn new(fold: OffsetFold) -> Self {
        Self {
            active: Calibration::new(Transform::identity()),
            freeze_offset: Vector3::zeros(),
            fold,
            calibrations: 0,
        }
    }

    /// Capture `reoriented` as the new reference frame.
    ///
    /// The freeze offset is folded into the captured translation according to
    /// the store's [`OffsetFold`]; the offset itself is left as is.
    pub fn calibrate(&mut self, reoriented: &Transform) {
        let mut working = *reoriented;
        let folded = self
            .fold
            .apply(&translation_of(reoriented), &self.freeze_offset);
        working.fixed_view_mut::<3, 1>(0, 3).copy_from(&folded);

        self.active = Calibration::new(working);
        self.calibrations += 1;

        info!(
            "Calibrated (#{}): origin=[{:.3}, {:.3}, {:.3}], freeze offset=[{:.3}, {:.3}, {:.3}]",
            self.calibrations,
            folded.x,
            folded.y,
            folded.z,
            self.freeze_offset.x,
            self.freeze_offset.y,
            self.freeze_offset.z
        );
    }

    /// True once at least one calibration has been captured.
    pub fn is_calibrated(&self) -> bool {
        self.calibrations > 0
    }

    pub fn calibration_count(&self) -> u64 {
        self.calibrations
    }

    /// The active calibration transform.
    pub fn transform(&self) -> &Transform {
        &self.active.transform
    }

    pub fn fold(&self) -> OffsetFold {
        self.fold
    }

    pub fn freeze_offset(&self) -> &Vector3<f64> {
        &self.freeze_offset
    }

    /// Add an unfreeze delta into the freeze offset.
    pub fn accumulate_freeze_offset(&mut self, delta: &Vector3<f64>) {
        self.freeze_offset += delta;
        debug!(
            "Freeze offset now [{:.3}, {:.3}, {:.3}]",
            self.freeze_offset.x, self.freeze_offset.y, self.freeze_offset.z
        );
    }

    /// `T_reoriented * T_calibration⁻¹`.
    pub fn calibrated_transform(&self, reoriented: &Transform) -> Transform {
        reoriented * self.active.inverse
    }

    /// Translation of the calibrated transform, before the freeze offset.
    pub fn calibrated_position(&self, reoriented: &Transform) -> Vector3<f64> {
        translation_of(&self.calibrated_transform(reoriented))
    }

    /// Calibrated pose with the freeze offset removed from the position.
    pub fn pose(&self, reoriented: &Transform) -> Pose {
        let calibrated = self.calibrated_transform(reoriented);
        Pose {
            rotation: rotation_of(&calibrated),
            position: translation_of(&calibrated) - self.freeze_offset,
        }
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(OffsetFold::default())
    }
}
