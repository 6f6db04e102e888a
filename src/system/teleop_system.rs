//! Teleop System - Main entry point and thread orchestration.
//!
//! The `TeleopSystem` is the top-level struct that users interact with.
//! It owns the shared state and spawns the processing thread that runs the
//! pose pipeline. Frames and operator commands reach that thread through one
//! bounded channel, so they are applied strictly in submission order.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, info, warn};

use crate::config::SystemConfig;
use crate::stream::{ConnectionState, StreamAddress, StreamChannel, StreamError};
use crate::tracking::{PipelineStats, PosePipeline};

use super::messages::{RawFrame, TeleopCommand};
use super::shared_state::SharedState;

/// Pose streaming system: the processing thread plus its inbound channel.
pub struct TeleopSystem {
    /// Shared state (controls, stats, flags) accessible by all threads.
    shared: Arc<SharedState>,

    /// Connection used by the pipeline; connect/disconnect go straight to it.
    channel: Arc<StreamChannel>,

    /// Channel sender for commands (callers -> processing thread).
    cmd_sender: Option<Sender<TeleopCommand>>,

    /// Handle to the processing thread.
    worker_handle: Option<JoinHandle<()>>,
}

impl TeleopSystem {
    /// Start the processing thread around a fully configured pipeline.
    ///
    /// Observers must be registered on `pipeline` before calling this.
    pub fn start(pipeline: PosePipeline, config: &SystemConfig) -> Result<Self> {
        let shared = SharedState::new(Arc::clone(pipeline.controls()));
        let channel = Arc::clone(pipeline.channel());

        let (cmd_sender, cmd_receiver) = bounded::<TeleopCommand>(config.command_capacity);

        let worker_handle = Self::spawn_worker(
            pipeline,
            cmd_receiver,
            shared.clone(),
            config.recv_timeout(),
        )?;

        Ok(Self {
            shared,
            channel,
            cmd_sender: Some(cmd_sender),
            worker_handle: Some(worker_handle),
        })
    }

    /// Spawn the processing thread.
    fn spawn_worker(
        pipeline: PosePipeline,
        cmd_receiver: Receiver<TeleopCommand>,
        shared: Arc<SharedState>,
        recv_timeout: Duration,
    ) -> Result<JoinHandle<()>> {
        let mut worker = Worker {
            pipeline,
            shared,
            recv_timeout,
        };
        thread::Builder::new()
            .name("pose-pipeline".to_string())
            .spawn(move || worker.run(cmd_receiver))
            .context("Failed to spawn pose pipeline thread")
    }

    fn submit(&self, command: TeleopCommand) -> Result<()> {
        let sender = self
            .cmd_sender
            .as_ref()
            .ok_or_else(|| anyhow!("Teleop system has been shut down"))?;
        sender
            .send(command)
            .map_err(|_| anyhow!("Pose pipeline thread has stopped"))
    }

    /// Hand a raw tracker frame to the processing thread.
    ///
    /// Blocks while the command channel is full, which paces the tracker to
    /// the pipeline.
    pub fn submit_frame(&self, frame: RawFrame) -> Result<()> {
        self.submit(TeleopCommand::Frame(frame))
    }

    /// Make the device's current pose the new origin.
    pub fn calibrate(&self) -> Result<()> {
        self.submit(TeleopCommand::Calibrate)
    }

    /// Freeze control pressed.
    pub fn freeze(&self) -> Result<()> {
        self.submit(TeleopCommand::Freeze)
    }

    /// Freeze control released.
    pub fn unfreeze(&self) -> Result<()> {
        self.submit(TeleopCommand::Unfreeze)
    }

    /// Wait until every command submitted so far has been applied and
    /// return the counters at that point.
    pub fn sync(&self) -> Result<PipelineStats> {
        let (reply_sender, reply_receiver) = bounded(1);
        self.submit(TeleopCommand::Sync(reply_sender))?;
        reply_receiver
            .recv()
            .map_err(|_| anyhow!("Pose pipeline thread stopped before replying"))
    }

    /// Flip the toggle control and return its new value.
    pub fn toggle(&self) -> bool {
        self.shared.controls.toggle()
    }

    /// Press or release the momentary button.
    pub fn set_button(&self, pressed: bool) {
        self.shared.controls.set_button(pressed);
    }

    /// Start connecting to the remote controller. Does not block.
    pub fn connect(&self, address: StreamAddress) {
        self.channel.connect(address);
    }

    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        self.channel.wait_until_ready(timeout)
    }

    pub fn disconnect(&self) -> Result<(), StreamError> {
        self.channel.disconnect()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn is_frozen(&self) -> bool {
        self.shared.is_frozen()
    }

    /// Counters as last published by the processing thread.
    pub fn stats(&self) -> PipelineStats {
        *self.shared.stats.read()
    }

    /// Get a reference to the shared state for presentation layers.
    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Shutdown the system gracefully.
    ///
    /// Stops frame processing, closes the connection with the configured
    /// reason, then waits for the processing thread. Closing first releases a
    /// send stuck on the transport. Commands still queued when this is called
    /// are discarded.
    pub fn shutdown(&mut self) -> PipelineStats {
        let Some(handle) = self.worker_handle.take() else {
            return self.stats();
        };

        self.shared.request_shutdown();
        self.cmd_sender = None;

        if self.channel.state() != ConnectionState::Disconnected {
            if let Err(e) = self.channel.disconnect() {
                warn!("Failed to close stream on shutdown: {}", e);
            }
        }

        if handle.join().is_err() {
            warn!("Pose pipeline thread panicked");
        }

        self.stats()
    }
}

impl Drop for TeleopSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the processing thread.
struct Worker {
    pipeline: PosePipeline,
    shared: Arc<SharedState>,
    recv_timeout: Duration,
}

impl Worker {
    /// Main loop: apply commands until shutdown or until every sender is gone.
    fn run(&mut self, cmd_receiver: Receiver<TeleopCommand>) {
        info!("Pose pipeline thread started");

        loop {
            // Check for shutdown
            if self.shared.is_shutdown_requested() {
                break;
            }

            match cmd_receiver.recv_timeout(self.recv_timeout) {
                Ok(command) => {
                    self.handle(command);
                }
                Err(RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Pose pipeline command channel disconnected");
                    break;
                }
            }
        }

        let stats = self.pipeline.stats();
        info!(
            received = stats.frames_received,
            emitted = stats.frames_emitted,
            dropped = stats.frames_dropped,
            sent = stats.sends_ok,
            failed = stats.sends_failed,
            calibrations = stats.calibrations,
            "Pose pipeline thread exiting"
        );
    }

    fn handle(&mut self, command: TeleopCommand) {
        match command {
            TeleopCommand::Frame(frame) => {
                let outcome = self.pipeline.process_frame(&frame.transform);
                debug!(
                    timestamp_ns = frame.timestamp_ns,
                    emitted = outcome.pose().is_some(),
                    "Frame processed"
                );
            }
            TeleopCommand::Calibrate => {
                self.pipeline.calibrate();
            }
            TeleopCommand::Freeze => {
                self.pipeline.freeze();
            }
            TeleopCommand::Unfreeze => {
                self.pipeline.unfreeze();
            }
            TeleopCommand::Sync(reply) => {
                // The caller may have given up waiting.
                let _ = reply.send(self.pipeline.stats());
            }
        }

        self.shared.set_frozen(self.pipeline.freeze_state().is_frozen());
        *self.shared.stats.write() = self.pipeline.stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Transform;
    use crate::stream::PoseMessage;
    use crate::test_utils::{RecordingObserver, ScriptedConnector, raw_at};
    use crate::tracking::{ControlPanel, OffsetFold};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn start(
        connector: &Arc<ScriptedConnector>,
        fold: OffsetFold,
    ) -> (TeleopSystem, RecordingObserver) {
        let channel = StreamChannel::new(connector.clone());
        let mut pipeline = PosePipeline::new(channel, ControlPanel::new(), fold);
        let observer = RecordingObserver::default();
        pipeline.add_pose_observer(Box::new(observer.clone()));
        pipeline.add_timing_observer(Box::new(observer.clone()));

        let config = SystemConfig {
            command_capacity: 4,
            recv_timeout_ms: 10,
        };
        let system = TeleopSystem::start(pipeline, &config).unwrap();
        (system, observer)
    }

    fn connected(connector: &Arc<ScriptedConnector>) -> (TeleopSystem, RecordingObserver) {
        let (system, observer) = start(connector, OffsetFold::PerAxis);
        system.connect(StreamAddress::new("127.0.0.1", "8888").unwrap());
        assert!(system.wait_until_ready(Duration::from_secs(2)));
        (system, observer)
    }

    fn frame(timestamp_ns: u64, transform: Transform) -> RawFrame {
        RawFrame {
            timestamp_ns,
            transform,
        }
    }

    #[test]
    fn test_commands_are_ordered_with_frames() {
        let connector = ScriptedConnector::new();
        let (mut system, observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.submit_frame(frame(1, raw_at(1.0, 0.0, 0.0))).unwrap();
        system.freeze().unwrap();
        system.submit_frame(frame(2, raw_at(5.0, 0.0, 0.0))).unwrap();
        system.unfreeze().unwrap();
        system.submit_frame(frame(3, raw_at(5.0, 0.0, 0.0))).unwrap();
        system.submit_frame(frame(4, raw_at(6.0, 0.0, 0.0))).unwrap();

        let stats = system.sync().unwrap();
        assert_eq!(stats.frames_received, 5);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.sends_ok, 4);

        let positions = observer.positions();
        assert_eq!(positions.len(), 4);
        assert_relative_eq!(positions[1], Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-10);
        assert_relative_eq!(positions[2], Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-10);
        assert_relative_eq!(positions[3], Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-10);

        let last = PoseMessage::from_json(connector.sent().last().unwrap()).unwrap();
        assert_relative_eq!(last.position_vector(), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-10);

        system.shutdown();
    }

    #[test]
    fn test_frozen_flag_is_published() {
        let connector = ScriptedConnector::new();
        let (mut system, _observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.freeze().unwrap();
        system.sync().unwrap();
        assert!(system.is_frozen());

        system.unfreeze().unwrap();
        system.sync().unwrap();
        assert!(!system.is_frozen());

        system.shutdown();
    }

    #[test]
    fn test_calibrate_command_resets_origin() {
        let connector = ScriptedConnector::new();
        let (mut system, observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.submit_frame(frame(1, raw_at(3.0, 1.0, -2.0))).unwrap();
        system.calibrate().unwrap();
        system.submit_frame(frame(2, raw_at(3.0, 1.0, -2.0))).unwrap();
        system.submit_frame(frame(3, raw_at(3.0, 2.0, -2.0))).unwrap();

        let stats = system.sync().unwrap();
        assert_eq!(stats.calibrations, 2);

        let positions = observer.positions();
        assert_relative_eq!(positions[1], Vector3::new(3.0, 1.0, -2.0), epsilon = 1e-10);
        assert_relative_eq!(positions[2], Vector3::zeros(), epsilon = 1e-10);
        assert_relative_eq!(positions[3], Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-10);

        system.shutdown();
    }

    #[test]
    fn test_controls_reach_the_wire() {
        let connector = ScriptedConnector::new();
        let (mut system, _observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.sync().unwrap();

        assert!(system.toggle());
        system.set_button(true);
        system.submit_frame(frame(1, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.sync().unwrap();

        let sent = connector.sent();
        let first = PoseMessage::from_json(&sent[0]).unwrap();
        let second = PoseMessage::from_json(&sent[1]).unwrap();
        assert!(!first.toggle && !first.button);
        assert!(second.toggle && second.button);

        system.shutdown();
    }

    #[test]
    fn test_shutdown_disconnects_with_reason() {
        let connector = ScriptedConnector::new();
        let (mut system, _observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.sync().unwrap();

        let stats = system.shutdown();
        assert_eq!(stats.frames_emitted, 1);
        assert_eq!(system.connection_state(), ConnectionState::Disconnected);
        assert_eq!(connector.close_reasons(), vec!["Exited App Session".to_string()]);

        // Second shutdown (and the one in Drop) is a no-op.
        system.shutdown();
        assert_eq!(connector.close_reasons().len(), 1);
        assert!(system.submit_frame(frame(1, raw_at(0.0, 0.0, 0.0))).is_err());
    }

    #[test]
    fn test_shutdown_releases_hung_send() {
        let connector = ScriptedConnector::new();
        let (mut system, observer) = connected(&connector);
        connector.hang_sends(true);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        assert!(connector.wait_for_hung_send(Duration::from_secs(2)));

        let stats = system.shutdown();
        assert_eq!(stats.frames_emitted, 1);
        assert_eq!(stats.sends_failed, 1);
        assert_eq!(system.connection_state(), ConnectionState::Disconnected);
        assert_eq!(connector.interrupts(), 1);
        assert!(!observer.reports.lock()[0].delivered());
    }

    #[test]
    fn test_send_failures_do_not_stop_processing() {
        let connector = ScriptedConnector::new();
        let (mut system, observer) = connected(&connector);

        system.submit_frame(frame(0, raw_at(0.0, 0.0, 0.0))).unwrap();
        system.sync().unwrap();

        connector.fail_sends(true);
        for i in 1..4 {
            system.submit_frame(frame(i, raw_at(i as f64, 0.0, 0.0))).unwrap();
        }
        let stats = system.sync().unwrap();

        assert_eq!(stats.sends_failed, 3);
        assert_eq!(system.connection_state(), ConnectionState::SendFailed);
        assert_eq!(observer.positions().len(), 4);
        assert!(observer.reports.lock()[1..].iter().all(|r| !r.delivered()));

        system.shutdown();
    }

    #[test]
    fn test_runs_without_connection() {
        let connector = ScriptedConnector::new();
        let (mut system, observer) = start(&connector, OffsetFold::XAxisOnly);

        system.submit_frame(frame(0, raw_at(1.0, 1.0, 1.0))).unwrap();
        system.submit_frame(frame(1, raw_at(1.0, 1.0, 2.0))).unwrap();
        let stats = system.sync().unwrap();

        assert_eq!(stats.frames_emitted, 2);
        assert_eq!(stats.sends_failed, 2);
        assert!(!system.is_connected());
        assert_relative_eq!(observer.positions()[1], Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-10);
        assert!(connector.sent().is_empty());

        system.shutdown();
        assert!(connector.close_reasons().is_empty());
    }
}
