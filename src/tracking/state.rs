//! Freeze state machine.

/// Whether motion is currently transferred to the remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    /// Poses are computed and streamed for every frame.
    Tracking,
    /// Motion transfer is suspended; incoming frames are dropped.
    Frozen,
}

impl Default for FreezeState {
    fn default() -> Self {
        Self::Tracking
    }
}

impl FreezeState {
    pub fn is_frozen(self) -> bool {
        self == FreezeState::Frozen
    }
}
