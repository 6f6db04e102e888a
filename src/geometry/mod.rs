//! Geometry utilities: axis conventions and rigid 4×4 transforms.

pub mod frames;

pub use frames::{
    Transform, from_parts, reorient, reorient_inverse, rigid_inverse, rotation_of, translation_of,
};
