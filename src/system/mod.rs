//! Teleoperation system orchestration and thread management.
//!
//! This module contains the top-level `TeleopSystem` that owns the
//! processing thread, along with shared state and inter-thread messaging
//! types.

pub mod messages;
pub mod shared_state;
mod teleop_system;

pub use messages::{RawFrame, TeleopCommand};
pub use shared_state::SharedState;
pub use teleop_system::TeleopSystem;
