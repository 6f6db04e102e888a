//! Inter-thread message types.
//!
//! Everything that reads or mutates the calibration store travels through a
//! single channel into the processing thread, so frames and operator commands
//! are applied in the order they were issued.

use crossbeam_channel::Sender;

use crate::geometry::Transform;
use crate::tracking::PipelineStats;

/// One raw tracker frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFrame {
    /// Tracker timestamp in nanoseconds.
    pub timestamp_ns: u64,
    /// Device transform in tracker axes.
    pub transform: Transform,
}

/// Message sent from the tracker and input handlers to the processing thread.
#[derive(Debug, Clone)]
pub enum TeleopCommand {
    /// Process a raw frame.
    Frame(RawFrame),
    /// Make the current device pose the new origin.
    Calibrate,
    /// Suspend motion transfer.
    Freeze,
    /// Resume motion transfer.
    Unfreeze,
    /// Reply with the counters once every earlier command has been applied.
    Sync(Sender<PipelineStats>),
}
