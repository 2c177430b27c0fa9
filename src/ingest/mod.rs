//! Frame ingestion sources.
//!
//! This module provides the sources frames are pulled from:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Live cameras (feature: ingest-v4l2)
//! - Synthetic sources (`stub://` origins, endless) for demos
//! - Scripted sources (fixed frame sequence) for tests
//!
//! All sources produce `Frame` instances with a per-source sequence
//! number and signal end-of-stream with `Ok(None)`. The ingestion layer
//! does not retry: a failed open or a hard read failure is reported
//! upward and ends the run.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod script;

pub use camera::CameraSource;
pub use file::FileSource;
pub use script::{ScriptedSource, SyntheticSource};

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// Capture hints passed to sources. Real devices may negotiate different
/// dimensions; synthetic sources honor them exactly.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 10,
        }
    }
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoOrigin {
    /// Live camera device index.
    Camera(u32),
    /// Path to a recorded video file.
    File(String),
    /// Endless synthetic source, named for logging.
    Stub(String),
}

impl FromStr for VideoOrigin {
    type Err = anyhow::Error;

    /// A bare integer selects a camera index, `stub://name` a synthetic
    /// source, anything else a local file path. URL schemes other than
    /// `stub://` are rejected: ingestion is local-only.
    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("video source must not be empty"));
        }
        if let Ok(index) = raw.parse::<u32>() {
            return Ok(VideoOrigin::Camera(index));
        }
        if let Some(name) = raw.strip_prefix("stub://") {
            return Ok(VideoOrigin::Stub(name.to_string()));
        }
        if raw.contains("://") {
            return Err(anyhow!(
                "video ingestion only supports camera indices and local paths (no URL schemes)"
            ));
        }
        Ok(VideoOrigin::File(raw.to_string()))
    }
}

impl fmt::Display for VideoOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoOrigin::Camera(index) => write!(f, "camera:{}", index),
            VideoOrigin::File(path) => write!(f, "file:{}", path),
            VideoOrigin::Stub(name) => write!(f, "stub://{}", name),
        }
    }
}

/// A source of sequential frames.
///
/// `Ok(None)` signals end-of-stream; the pipeline stops cleanly. Sources
/// release their underlying device or decoder in `close`, which also
/// runs on drop, so resources survive neither error paths nor early
/// stops.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release underlying resources. Idempotent; subsequent
    /// `next_frame` calls report end-of-stream.
    fn close(&mut self);
}

/// Open a source for the configured origin.
///
/// A failed open is fatal: it is reported upward and the run never
/// starts. No retry.
pub fn open_source(origin: &VideoOrigin, settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    match origin {
        VideoOrigin::Camera(index) => Ok(Box::new(CameraSource::open(*index, settings)?)),
        VideoOrigin::File(path) => Ok(Box::new(FileSource::open(path, settings)?)),
        VideoOrigin::Stub(name) => Ok(Box::new(SyntheticSource::new(name, settings))),
    }
}
