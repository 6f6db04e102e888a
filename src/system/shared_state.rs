//! State shared between the processing thread and everything else.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::tracking::{ControlPanel, PipelineStats};

/// Shared state accessible from input handlers, the tracker feed and the
/// processing thread.
pub struct SharedState {
    /// Toggle and button, written by input handlers, read per message.
    pub controls: Arc<ControlPanel>,

    /// Pipeline counters, published by the processing thread after every command.
    pub stats: RwLock<PipelineStats>,

    /// Mirror of the freeze state for presentation layers.
    frozen: AtomicBool,

    /// Request the processing thread to finish and exit.
    shutdown_requested: AtomicBool,
}

impl SharedState {
    pub fn new(controls: Arc<ControlPanel>) -> Arc<Self> {
        Arc::new(Self {
            controls,
            stats: RwLock::new(PipelineStats::default()),
            frozen: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
        })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub(crate) fn set_frozen(&self, value: bool) {
        self.frozen.store(value, Ordering::SeqCst);
    }

    /// Request shutdown of the processing thread.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown was requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}
