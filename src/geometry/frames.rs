//! Coordinate frame conventions and rigid-transform helpers.
//!
//! # Overview
//!
//! Two coordinate systems appear in the pipeline:
//!
//! 1. **Tracker Frame** - what the external tracker reports every frame
//! 2. **Working Frame** - what calibration, freezing and the wire message use
//!
//! Every raw transform is moved into the working frame with [`reorient`]
//! before anything else looks at it. Calibration, freeze and unfreeze all go
//! through the same function, so all of them observe a consistent frame.
//!
//! ## Tracker Frame
//! ```text
//!        +Y (up)
//!         |
//!         |
//!         +------ +X (right)
//!        /
//!       /
//!      +Z (towards the operator)
//! ```
//!
//! ## Working Frame
//! ```text
//!        +Z (up)
//!         |
//!         |
//!         +------ +Y (left)
//!        /
//!       /
//!      +X (forward)
//! ```
//!
//! The permutation maps:
//! - Working X = -Tracker Z
//! - Working Y = -Tracker X
//! - Working Z = +Tracker Y
//!
//! Only the orientation is permuted (`R_wt * R_raw`). The translation column
//! of the raw transform is carried across untouched.
//!
//! # Transform Layout
//!
//! All transforms are homogeneous `Matrix4<f64>` with the rotation in the
//! upper-left 3×3 block and the translation in the last column:
//! ```text
//! | R  t |
//! | 0  1 |
//! ```

use nalgebra::{Matrix3, Matrix4, Vector3};

/// Homogeneous rigid transform (rotation + translation).
pub type Transform = Matrix4<f64>;

// ============================================================================
// Axis Permutation
// ============================================================================

/// Fixed rotation taking tracker axes to working axes.
#[rustfmt::skip]
pub fn rotation_working_tracker() -> Matrix3<f64> {
    Matrix3::new(
         0.0, 0.0, -1.0,  // Working X = -Tracker Z
        -1.0, 0.0,  0.0,  // Working Y = -Tracker X
         0.0, 1.0,  0.0,  // Working Z = Tracker Y
    )
}

/// Fixed rotation taking working axes back to tracker axes.
pub fn rotation_tracker_working() -> Matrix3<f64> {
    // Inverse = transpose for rotation matrices
    rotation_working_tracker().transpose()
}

/// Move a raw tracker transform into the working frame.
///
/// The rotation block is permuted; the translation is copied as is.
#[inline]
pub fn reorient(raw: &Transform) -> Transform {
    from_parts(&(rotation_working_tracker() * rotation_of(raw)), &translation_of(raw))
}

/// Undo [`reorient`], recovering the transform in tracker axes.
#[inline]
pub fn reorient_inverse(reoriented: &Transform) -> Transform {
    from_parts(
        &(rotation_tracker_working() * rotation_of(reoriented)),
        &translation_of(reoriented),
    )
}

// ============================================================================
// Rigid Transform Helpers
// ============================================================================

/// Upper-left 3×3 rotation block.
pub fn rotation_of(t: &Transform) -> Matrix3<f64> {
    t.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Translation column.
pub fn translation_of(t: &Transform) -> Vector3<f64> {
    t.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Assemble a homogeneous transform from a rotation and a translation.
pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Transform {
    let mut t = Transform::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    t
}

/// Closed-form inverse of a rigid transform.
///
/// ```text
/// | R  t |^-1   | Rᵀ  -Rᵀt |
/// | 0  1 |    = | 0     1  |
/// ```
///
/// Only valid when the rotation block is orthonormal, which holds for every
/// transform reported by the tracker and everything derived from one here.
pub fn rigid_inverse(t: &Transform) -> Transform {
    let r_t = rotation_of(t).transpose();
    let translation = -(r_t * translation_of(t));
    from_parts(&r_t, &translation)
}
