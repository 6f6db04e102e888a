//! Replays a recorded tracker session into a remote controller.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use pose_teleop::config::TeleopConfig;
use pose_teleop::io::RecordedSession;
use pose_teleop::stream::{StreamChannel, WebSocketConnector};
use pose_teleop::system::TeleopSystem;
use pose_teleop::tracking::{ControlPanel, LogObserver, OffsetFold, PosePipeline};

#[derive(Parser)]
#[command(name = "pose-teleop")]
#[command(about = "Stream calibrated device poses to a remote controller")]
#[command(version)]
struct Args {
    /// Recorded session (CSV: timestamp_ns, 16 row-major matrix entries[, toggle, button]).
    #[arg(long)]
    input: PathBuf,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Controller host, overrides the config.
    #[arg(long)]
    host: Option<String>,

    /// Controller port, overrides the config.
    #[arg(long)]
    port: Option<u16>,

    /// Playback rate in frames per second (0 = as fast as possible).
    #[arg(long)]
    rate_hz: Option<f64>,

    /// per_axis or x_axis_only.
    #[arg(long)]
    offset_fold: Option<OffsetFold>,

    /// Hold the freeze control from frame FROM until frame TO.
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    freeze: Option<Vec<usize>>,

    /// Recalibrate when this frame is reached.
    #[arg(long)]
    calibrate_at: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TeleopConfig::load(path)?,
        None => TeleopConfig::default(),
    };
    if let Some(rate_hz) = args.rate_hz {
        config.replay.rate_hz = rate_hz;
    }
    if let Some(fold) = args.offset_fold {
        config.calibration.offset_fold = fold;
    }
    if let Some(host) = &args.host {
        config.stream.host = host.clone();
    }
    if let Some(port) = args.port {
        config.stream.port = port;
    }
    config.validate()?;

    let address = config
        .stream
        .address()
        .context("Invalid controller address")?;

    let freeze_window = match args.freeze.as_deref() {
        Some(&[from, to]) if from < to => Some((from, to)),
        Some(_) => bail!("--freeze FROM TO needs FROM < TO"),
        None => None,
    };

    let session = RecordedSession::load(&args.input)?;
    info!(
        "Replaying {} frames ({:.1} s) with {} offset folding",
        session.len(),
        session.duration_s(),
        config.calibration.offset_fold
    );

    let channel =
        StreamChannel::with_close_reason(Arc::new(WebSocketConnector), &config.stream.close_reason);
    let controls = ControlPanel::new();
    let mut pipeline = PosePipeline::new(channel, controls.clone(), config.calibration.offset_fold);
    pipeline.add_pose_observer(Box::new(LogObserver::new(config.replay.log_every)));
    pipeline.add_timing_observer(Box::new(LogObserver::new(config.replay.log_every)));

    let mut system = TeleopSystem::start(pipeline, &config.system)?;

    system.connect(address.clone());
    if system.wait_until_ready(config.stream.connect_timeout()) {
        info!("Controller ready at {}", address);
    } else {
        warn!(
            "Controller at {} not reachable ({:?}), poses will not be delivered",
            address,
            system.connection_state()
        );
    }

    let interval = config.replay.frame_interval();
    let started = Instant::now();
    for (idx, frame) in session.frames.iter().enumerate() {
        if let Some(flags) = frame.controls {
            controls.set_toggle(flags.toggle);
            controls.set_button(flags.button);
        }
        if args.calibrate_at == Some(idx) {
            system.calibrate()?;
        }
        if let Some((from, to)) = freeze_window {
            if idx == from {
                system.freeze()?;
            } else if idx == to {
                system.unfreeze()?;
            }
        }

        system.submit_frame(frame.raw())?;

        if let Some(interval) = interval {
            let due = interval * (idx as u32 + 1);
            if let Some(remaining) = due.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
    }

    system.sync()?;
    let stats = system.shutdown();
    println!(
        "Done! frames={} emitted={} dropped={} sent={} failed={} calibrations={} ({:.1} s)",
        stats.frames_received,
        stats.frames_emitted,
        stats.frames_dropped,
        stats.sends_ok,
        stats.sends_failed,
        stats.calibrations,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
