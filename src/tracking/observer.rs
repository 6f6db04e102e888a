//! Observer interfaces used by presentation layers.
//!
//! Observers are invoked synchronously from the frame-processing context with
//! value snapshots. They must return quickly; a slow observer throttles the
//! pose rate just like a slow send does.

use tracing::{debug, trace};

use super::pose::Pose;
use super::result::SendReport;

/// Receives every emitted pose.
pub trait PoseObserver: Send {
    fn pose_updated(&mut self, pose: &Pose);
}

/// Receives the outcome and duration of every send.
pub trait SendTimingObserver: Send {
    fn send_completed(&mut self, report: &SendReport);
}

impl<F> PoseObserver for F
where
    F: FnMut(&Pose) + Send,
{
    fn pose_updated(&mut self, pose: &Pose) {
        self(pose)
    }
}

impl<F> SendTimingObserver for F
where
    F: FnMut(&SendReport) + Send,
{
    fn send_completed(&mut self, report: &SendReport) {
        self(report)
    }
}

/// Writes poses and send timings to the log every `every` frames.
pub struct LogObserver {
    every: u64,
    poses: u64,
    sends: u64,
}

impl LogObserver {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            poses: 0,
            sends: 0,
        }
    }
}

impl PoseObserver for LogObserver {
    fn pose_updated(&mut self, pose: &Pose) {
        self.poses += 1;
        if self.poses % self.every == 0 {
            let p = &pose.position;
            debug!(
                "Pose #{}: position=[{:.3}, {:.3}, {:.3}]",
                self.poses, p.x, p.y, p.z
            );
        }
    }
}

impl SendTimingObserver for LogObserver {
    fn send_completed(&mut self, report: &SendReport) {
        self.sends += 1;
        if self.sends % self.every == 0 {
            match &report.error {
                None => debug!("Send #{} took {:.2} ms", self.sends, report.elapsed_ms()),
                Some(e) => debug!(
                    "Send #{} failed after {:.2} ms: {}",
                    self.sends,
                    report.elapsed_ms(),
                    e
                ),
            }
        } else {
            trace!("Send took {:.2} ms", report.elapsed_ms());
        }
    }
}
