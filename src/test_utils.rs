//! Shared test doubles for the stream seams and the pose pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use nalgebra::{Matrix3, Vector3};
use parking_lot::Mutex;

use crate::geometry::{Transform, from_parts, reorient_inverse};
use crate::stream::{Connector, Interrupt, StreamAddress, StreamChannel, StreamError, Transport};
use crate::tracking::{Pose, PoseObserver, SendReport, SendTimingObserver};

#[derive(Default)]
struct Recording {
    urls: Vec<String>,
    sent: Vec<String>,
    close_reasons: Vec<String>,
    interrupts: usize,
}

/// Holds hung sends until their transport is interrupted.
struct SendGate {
    entered: (Sender<()>, Receiver<()>),
    release: (Sender<()>, Receiver<()>),
}

impl Default for SendGate {
    fn default() -> Self {
        Self {
            entered: unbounded(),
            release: unbounded(),
        }
    }
}

/// Connector whose transports record traffic instead of touching the network.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    recording: Arc<Mutex<Recording>>,
    refuse: AtomicBool,
    fail_sends: Arc<AtomicBool>,
    hang_sends: Arc<AtomicBool>,
    gate: Arc<SendGate>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent handshakes fail.
    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make every transport (existing and future) fail on send.
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make every send block until the transport is interrupted, then fail.
    pub(crate) fn hang_sends(&self, hang: bool) {
        self.hang_sends.store(hang, Ordering::SeqCst);
    }

    /// Wait until a send is blocked in a hung transport.
    pub(crate) fn wait_for_hung_send(&self, timeout: Duration) -> bool {
        self.gate.entered.1.recv_timeout(timeout).is_ok()
    }

    pub(crate) fn interrupts(&self) -> usize {
        self.recording.lock().interrupts
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.recording.lock().urls.clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.recording.lock().sent.clone()
    }

    pub(crate) fn close_reasons(&self) -> Vec<String> {
        self.recording.lock().close_reasons.clone()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, url: &str) -> Result<Box<dyn Transport>, StreamError> {
        self.recording.lock().urls.push(url.to_string());
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StreamError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(ScriptedTransport {
            recording: Arc::clone(&self.recording),
            fail_sends: Arc::clone(&self.fail_sends),
            hang_sends: Arc::clone(&self.hang_sends),
            gate: Arc::clone(&self.gate),
        }))
    }
}

struct ScriptedTransport {
    recording: Arc<Mutex<Recording>>,
    fail_sends: Arc<AtomicBool>,
    hang_sends: Arc<AtomicBool>,
    gate: Arc<SendGate>,
}

struct ScriptedInterrupt {
    recording: Arc<Mutex<Recording>>,
    gate: Arc<SendGate>,
}

impl Interrupt for ScriptedInterrupt {
    fn interrupt(&self) {
        self.recording.lock().interrupts += 1;
        let _ = self.gate.release.0.send(());
    }
}

impl Transport for ScriptedTransport {
    fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        if self.hang_sends.load(Ordering::SeqCst) {
            let _ = self.gate.entered.0.send(());
            let _ = self.gate.release.1.recv();
            return Err(StreamError::Send("connection reset".to_string()));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(StreamError::Send("broken pipe".to_string()));
        }
        self.recording.lock().sent.push(text);
        Ok(())
    }

    fn close(&mut self, reason: &str) -> Result<(), StreamError> {
        self.recording.lock().close_reasons.push(reason.to_string());
        Ok(())
    }

    fn interrupter(&self) -> Option<Box<dyn Interrupt>> {
        Some(Box::new(ScriptedInterrupt {
            recording: Arc::clone(&self.recording),
            gate: Arc::clone(&self.gate),
        }))
    }
}

/// Connect `channel` to a placeholder address and wait for the handshake.
pub(crate) fn connect_ready(channel: &Arc<StreamChannel>) -> bool {
    channel.connect(StreamAddress::new("127.0.0.1", "9000").unwrap());
    channel.wait_until_ready(Duration::from_secs(2))
}

/// Raw tracker transform with identity orientation in working axes whose
/// reoriented translation is `(x, y, z)`.
pub(crate) fn raw_at(x: f64, y: f64, z: f64) -> Transform {
    reorient_inverse(&from_parts(&Matrix3::identity(), &Vector3::new(x, y, z)))
}

/// Observer that records every pose and send report it sees.
#[derive(Clone, Default)]
pub(crate) struct RecordingObserver {
    pub(crate) poses: Arc<Mutex<Vec<Pose>>>,
    pub(crate) reports: Arc<Mutex<Vec<SendReport>>>,
}

impl RecordingObserver {
    pub(crate) fn positions(&self) -> Vec<Vector3<f64>> {
        self.poses.lock().iter().map(|p| p.position).collect()
    }
}

impl PoseObserver for RecordingObserver {
    fn pose_updated(&mut self, pose: &Pose) {
        self.poses.lock().push(*pose);
    }
}

impl SendTimingObserver for RecordingObserver {
    fn send_completed(&mut self, report: &SendReport) {
        self.reports.lock().push(report.clone());
    }
}
