//! Tracking side of the pipeline: raw frames in, calibrated poses out.
//!
//! - Calibration store (reference frame + freeze offset)
//! - Freeze controller (Tracking ↔ Frozen)
//! - Pose pipeline orchestrating both per frame
//! - Observer interfaces for presentation layers

pub mod calibration;
pub mod controls;
pub mod freeze;
pub mod observer;
pub mod pipeline;
pub mod pose;
pub mod result;
pub mod state;

pub use calibration::{CalibrationStore, OffsetFold};
pub use controls::ControlPanel;
pub use freeze::FreezeController;
pub use observer::{LogObserver, PoseObserver, SendTimingObserver};
pub use pipeline::PosePipeline;
pub use pose::{ControlFlags, Pose};
pub use result::{EmittedPose, FrameOutcome, PipelineStats, SendReport};
pub use state::FreezeState;
