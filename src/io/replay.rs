//! CSV recordings of raw tracker output.
//!
//! One frame per line, no header, `#` starts a comment:
//!
//! ```text
//! timestamp_ns, m00, m01, m02, m03, m10, ..., m33[, toggle, button]
//! ```
//!
//! The 16 matrix entries are the raw device transform in row-major order.
//! `toggle` and `button` are optional `0`/`1` columns holding the operator
//! controls at that frame.

use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};
use nalgebra::{Matrix4, RowVector4};
use tracing::{info, warn};

use crate::geometry::Transform;
use crate::system::RawFrame;
use crate::tracking::ControlFlags;

const MATRIX_COLUMNS: usize = 16;
const MIN_COLUMNS: usize = 1 + MATRIX_COLUMNS;

/// Tolerance on the homogeneous bottom row `[0, 0, 0, 1]`.
const BOTTOM_ROW_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub timestamp_ns: u64,
    pub transform: Transform,
    /// Operator controls recorded with this frame, if the file has them.
    pub controls: Option<ControlFlags>,
}

impl RecordedFrame {
    pub fn raw(&self) -> RawFrame {
        RawFrame {
            timestamp_ns: self.timestamp_ns,
            transform: self.transform,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordedSession {
    pub frames: Vec<RecordedFrame>,
}

impl RecordedSession {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut frames = Vec::new();
        let mut skipped = 0usize;
        for (idx, rec) in rdr.records().enumerate() {
            let rec = rec?;
            if rec.len() < MIN_COLUMNS {
                skipped += 1;
                continue;
            }
            let frame = parse_frame(&rec)
                .with_context(|| format!("{}: bad record {}", path.display(), idx + 1))?;
            frames.push(frame);
        }

        if skipped > 0 {
            warn!("Skipped {} short records in {}", skipped, path.display());
        }
        if frames.is_empty() {
            bail!("No frames in {}", path.display());
        }
        if frames.windows(2).any(|w| w[1].timestamp_ns < w[0].timestamp_ns) {
            warn!("Timestamps in {} are not monotonic", path.display());
        }

        info!("Loaded {} frames from {}", frames.len(), path.display());
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Recording length in seconds, from the first to the last timestamp.
    pub fn duration_s(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => {
                last.timestamp_ns.saturating_sub(first.timestamp_ns) as f64 * 1e-9
            }
            _ => 0.0,
        }
    }
}

fn parse_frame(rec: &StringRecord) -> Result<RecordedFrame> {
    let timestamp_ns: u64 = rec[0].trim().parse()?;

    let mut values = [0.0f64; MATRIX_COLUMNS];
    for (i, value) in values.iter_mut().enumerate() {
        *value = rec[1 + i].trim().parse()?;
    }
    let transform = Matrix4::from_row_slice(&values);

    if !values.iter().all(|v| v.is_finite()) {
        bail!("transform has non-finite entries");
    }
    let bottom = transform.row(3);
    if (bottom - RowVector4::new(0.0, 0.0, 0.0, 1.0)).abs().max() > BOTTOM_ROW_TOLERANCE {
        bail!("transform bottom row is {:?}, expected [0, 0, 0, 1]", bottom);
    }

    let controls = if rec.len() >= MIN_COLUMNS + 2 {
        Some(ControlFlags {
            toggle: parse_flag(&rec[MIN_COLUMNS])?,
            button: parse_flag(&rec[MIN_COLUMNS + 1])?,
        })
    } else {
        None
    };

    Ok(RecordedFrame {
        timestamp_ns,
        transform,
        controls,
    })
}

fn parse_flag(field: &str) -> Result<bool> {
    match field.trim() {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => bail!("expected 0 or 1 for a control flag, got {:?}", other),
    }
}
