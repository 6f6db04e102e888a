//! Freeze controller: suspends motion transfer and hides the resulting jump.
//!
//! While frozen the operator may carry the device somewhere else. On resume,
//! the drift between the snapshot taken at freeze time and the device's new
//! calibrated position is folded into the freeze offset, so the next emitted
//! position continues from the last one shown before freezing.

use nalgebra::Vector3;
use tracing::{info, warn};

use crate::geometry::{Transform, reorient};

use super::calibration::CalibrationStore;
use super::state::FreezeState;

/// Tracking ↔ Frozen state machine with the position snapshot taken at freeze time.
#[derive(Debug, Clone, Default)]
pub struct FreezeController {
    state: FreezeState,
    /// Calibrated position when the freeze started. Only present while frozen.
    snapshot: Option<Vector3<f64>>,
}

impl FreezeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FreezeState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == FreezeState::Frozen
    }

    pub fn snapshot(&self) -> Option<&Vector3<f64>> {
        self.snapshot.as_ref()
    }

    /// Enter the frozen state, snapshotting the calibrated position of `current`.
    ///
    /// `current` is the tracker's latest raw transform; `None` when the tracker
    /// has not produced a frame yet, in which case no snapshot is taken.
    /// Returns false (and changes nothing) if already frozen.
    pub fn freeze(&mut self, store: &CalibrationStore, current: Option<&Transform>) -> bool {
        if self.is_frozen() {
            warn!("Freeze requested while already frozen, ignoring");
            return false;
        }

        self.snapshot = current.map(|raw| store.calibrated_position(&reorient(raw)));
        self.state = FreezeState::Frozen;

        match &self.snapshot {
            Some(p) => info!("Frozen at [{:.3}, {:.3}, {:.3}]", p.x, p.y, p.z),
            None => warn!("Frozen before the tracker produced a frame, no snapshot taken"),
        }
        true
    }

    /// Leave the frozen state, folding the drift since [`freeze`](Self::freeze)
    /// into the store's freeze offset.
    ///
    /// Returns the folded delta. Without a snapshot (or without a current
    /// frame) the controller still resumes tracking but leaves the offset
    /// untouched. Calling this while tracking is a logged no-op.
    pub fn unfreeze(
        &mut self,
        store: &mut CalibrationStore,
        current: Option<&Transform>,
    ) -> Option<Vector3<f64>> {
        if !self.is_frozen() {
            warn!("Unfreeze requested while tracking, ignoring");
            return None;
        }

        self.state = FreezeState::Tracking;

        let Some(snapshot) = self.snapshot.take() else {
            warn!("Unfreeze without a freeze snapshot, freeze offset unchanged");
            return None;
        };
        let Some(raw) = current else {
            warn!("Unfreeze without a tracker frame, freeze offset unchanged");
            return None;
        };

        let current_position = store.calibrated_position(&reorient(raw));
        let delta = current_position - snapshot;
        store.accumulate_freeze_offset(&delta);

        info!(
            "Unfrozen, drift [{:.3}, {:.3}, {:.3}] folded into freeze offset",
            delta.x, delta.y, delta.z
        );
        Some(delta)
    }

    /// Drop any snapshot and return to tracking. Used by calibration.
    pub fn reset(&mut self) {
        self.state = FreezeState::Tracking;
        self.snapshot = None;
    }
}
