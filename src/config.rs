//! Runtime configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```yaml
//! stream:
//!   host: 192.168.1.20
//!   port: 8888
//!   connect_timeout_ms: 2000
//!   close_reason: Exited App Session
//! calibration:
//!   offset_fold: x_axis_only   # or per_axis
//! system:
//!   command_capacity: 1
//!   recv_timeout_ms: 100
//! replay:
//!   rate_hz: 60.0
//!   log_every: 60
//! ```

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::stream::{DEFAULT_CLOSE_REASON, StreamAddress, StreamError};
use crate::tracking::OffsetFold;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    pub stream: StreamConfig,
    pub calibration: CalibrationConfig,
    pub system: SystemConfig,
    pub replay: ReplayConfig,
}

impl TeleopConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: TeleopConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: TeleopConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot. Call again after applying overrides.
    pub fn validate(&self) -> Result<()> {
        let rate_hz = self.replay.rate_hz;
        if !rate_hz.is_finite() || rate_hz < 0.0 {
            bail!("replay.rate_hz must be a non-negative number, got {}", rate_hz);
        }
        if rate_hz > 0.0 && Duration::try_from_secs_f64(1.0 / rate_hz).is_err() {
            bail!("replay.rate_hz {} gives an unrepresentable frame interval", rate_hz);
        }
        if self.system.recv_timeout_ms == 0 {
            bail!("system.recv_timeout_ms must be positive");
        }
        Ok(())
    }
}

/// Remote controller endpoint and connection behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    /// How long to wait for the handshake before giving up.
    pub connect_timeout_ms: u64,
    /// Reason carried by the close frame on disconnect.
    pub close_reason: String,
}

impl StreamConfig {
    pub fn address(&self) -> Result<StreamAddress, StreamError> {
        StreamAddress::new(&self.host, &self.port.to_string())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            connect_timeout_ms: 2000,
            close_reason: DEFAULT_CLOSE_REASON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub offset_fold: OffsetFold,
}

/// Processing thread settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Capacity of the command channel into the processing thread.
    /// Submitting blocks while it is full, which rate-gates the tracker.
    pub command_capacity: usize,
    /// How often the processing thread wakes up to check for shutdown.
    pub recv_timeout_ms: u64,
}

impl SystemConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            command_capacity: 1,
            recv_timeout_ms: 100,
        }
    }
}

/// Pacing of recorded-session playback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Frames per second; 0 plays back as fast as the pipeline accepts.
    pub rate_hz: f64,
    /// Log a pose line every this many frames.
    pub log_every: u64,
}

impl ReplayConfig {
    pub fn frame_interval(&self) -> Option<Duration> {
        if self.rate_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.rate_hz).ok()
        } else {
            None
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            rate_hz: 60.0,
            log_every: 60,
        }
    }
}
