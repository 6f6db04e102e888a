//! Per-frame outcomes and running statistics.
//!
//! These types describe what happened to a single raw frame:
//! - dropped because motion transfer is frozen
//! - emitted, with the pose, the control snapshot and how the send went

use std::time::Duration;

use crate::stream::StreamError;

use super::pose::{ControlFlags, Pose};

/// Timing and result of handing one pose to the stream channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// Wall-clock duration of the send call. Diagnostic only.
    pub elapsed: Duration,
    /// Why the send failed, if it did.
    pub error: Option<StreamError>,
}

impl SendReport {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// A pose that made it through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedPose {
    pub pose: Pose,
    pub flags: ControlFlags,
    pub send: SendReport,
    /// True when this frame triggered the implicit first calibration.
    pub calibrated: bool,
}

/// What the pipeline did with one raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frozen: nothing computed, nothing sent.
    Dropped,
    Emitted(EmittedPose),
}

impl FrameOutcome {
    pub fn pose(&self) -> Option<&Pose> {
        match self {
            FrameOutcome::Dropped => None,
            FrameOutcome::Emitted(emitted) => Some(&emitted.pose),
        }
    }
}

/// Counters kept by the pipeline over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Raw frames delivered by the tracker, frozen or not.
    pub frames_received: u64,
    /// Frames that produced a pose.
    pub frames_emitted: u64,
    /// Frames dropped while frozen.
    pub frames_dropped: u64,
    pub sends_ok: u64,
    pub sends_failed: u64,
    pub calibrations: u64,
}
