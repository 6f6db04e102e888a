//! Recorded tracker sessions.

pub mod replay;

pub use replay::{RecordedFrame, RecordedSession};
