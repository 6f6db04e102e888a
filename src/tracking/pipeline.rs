//! Pose pipeline: turns raw tracker frames into calibrated, streamed poses.
//!
//! Per raw frame:
//! 1. Frozen → drop the frame
//! 2. First frame → implicit calibration
//! 3. Reorient into working axes
//! 4. `T_calibrated = T_reoriented * T_calibration⁻¹`
//! 5. Split into rotation and position
//! 6. Subtract the freeze offset and notify pose observers
//! 7. Send pose + control flags, report timing to timing observers
//!
//! Everything runs synchronously on the caller's thread, one frame at a time.
//! Calibrate, freeze and unfreeze must be called from the same context as
//! `process_frame` (see [`crate::system::TeleopSystem`]).

use std::sync::Arc;
use std::time::Instant;

use nalgebra::Vector3;
use tracing::{trace, warn};

use crate::geometry::{Transform, reorient};
use crate::stream::StreamChannel;

use super::calibration::{CalibrationStore, OffsetFold};
use super::controls::ControlPanel;
use super::freeze::FreezeController;
use super::observer::{PoseObserver, SendTimingObserver};
use super::result::{EmittedPose, FrameOutcome, PipelineStats, SendReport};
use super::state::FreezeState;

/// Main per-frame processing structure.
pub struct PosePipeline {
    store: CalibrationStore,
    freeze: FreezeController,

    /// Toggle/button source read when composing each message.
    controls: Arc<ControlPanel>,

    /// Outgoing connection, shared with whoever issues connect/disconnect.
    channel: Arc<StreamChannel>,

    pose_observers: Vec<Box<dyn PoseObserver>>,
    timing_observers: Vec<Box<dyn SendTimingObserver>>,

    /// The tracker's current frame: the latest raw transform delivered,
    /// including frames dropped while frozen. Calibrate, freeze and unfreeze
    /// measure the device from this.
    latest_raw: Option<Transform>,

    stats: PipelineStats,
}

impl PosePipeline {
    pub fn new(channel: Arc<StreamChannel>, controls: Arc<ControlPanel>, fold: OffsetFold) -> Self {
        Self {
            store: CalibrationStore::new(fold),
            freeze: FreezeController::new(),
            controls,
            channel,
            pose_observers: Vec::new(),
            timing_observers: Vec::new(),
            latest_raw: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn add_pose_observer(&mut self, observer: Box<dyn PoseObserver>) {
        self.pose_observers.push(observer);
    }

    pub fn add_timing_observer(&mut self, observer: Box<dyn SendTimingObserver>) {
        self.timing_observers.push(observer);
    }

    pub fn channel(&self) -> &Arc<StreamChannel> {
        &self.channel
    }

    pub fn controls(&self) -> &Arc<ControlPanel> {
        &self.controls
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn freeze_state(&self) -> FreezeState {
        self.freeze.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Process one raw frame from the tracker.
    pub fn process_frame(&mut self, raw: &Transform) -> FrameOutcome {
        self.stats.frames_received += 1;
        self.latest_raw = Some(*raw);

        if self.freeze.is_frozen() {
            self.stats.frames_dropped += 1;
            trace!("Frame dropped while frozen");
            return FrameOutcome::Dropped;
        }

        let calibrated = !self.store.is_calibrated();
        if calibrated {
            self.calibrate();
        }

        let pose = self.store.pose(&reorient(raw));
        for observer in &mut self.pose_observers {
            observer.pose_updated(&pose);
        }

        let flags = self.controls.snapshot();
        let started = Instant::now();
        let result = self.channel.send(&pose, flags);
        let send = SendReport {
            elapsed: started.elapsed(),
            error: result.err(),
        };

        if send.delivered() {
            self.stats.sends_ok += 1;
        } else {
            self.stats.sends_failed += 1;
        }
        self.stats.frames_emitted += 1;

        for observer in &mut self.timing_observers {
            observer.send_completed(&send);
        }

        FrameOutcome::Emitted(EmittedPose {
            pose,
            flags,
            send,
            calibrated,
        })
    }

    /// Make the device's current pose the new origin and identity orientation.
    ///
    /// Also leaves the frozen state if active. Returns false when the tracker
    /// has not delivered a frame yet; the first frame will calibrate then.
    pub fn calibrate(&mut self) -> bool {
        let Some(raw) = self.latest_raw else {
            warn!("Calibration requested before the tracker produced a frame, deferring");
            return false;
        };
        self.store.calibrate(&reorient(&raw));
        self.freeze.reset();
        self.stats.calibrations += 1;
        true
    }

    /// Suspend motion transfer. Returns false if already frozen.
    pub fn freeze(&mut self) -> bool {
        self.freeze.freeze(&self.store, self.latest_raw.as_ref())
    }

    /// Resume motion transfer without a position jump.
    ///
    /// Returns the drift folded into the freeze offset, if any.
    pub fn unfreeze(&mut self) -> Option<Vector3<f64>> {
        self.freeze
            .unfreeze(&mut self.store, self.latest_raw.as_ref())
    }
}
