//! beltwatch - production-line defect inspection pipeline.
//!
//! Frames are pulled from a video origin (camera, recorded file, or a
//! synthetic source), run through an object-detection backend, and each
//! inspected item is classified as Damaged or Intact. A counting policy
//! deduplicates physical items across the frames they are visible in, a
//! consecutive-defect alarm watches the damaged stream, and committed
//! classifications land in a SQLite report exportable as CSV.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (camera, file, synthetic/scripted)
//! - `detect`: detector backends (stub, ONNX via tract)
//! - `count`: counting policies (per-frame, line-crossing tracker)
//! - `alarm`: consecutive-defect alarm
//! - `pipeline`: the detection loop and its run/pause/stop control
//! - `report`: report store with CSV export
//!
//! Data flows one direction: source -> detector -> counter -> emitted
//! events. Control flows the other way: start/pause/resume/stop into the
//! loop. The run/pause flags are the only state shared across threads;
//! everything else is owned by the processing thread.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub mod alarm;
pub mod annotate;
pub mod config;
pub mod count;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod report;

pub use alarm::DefectAlarm;
pub use config::BeltwatchConfig;
pub use count::{CountingPolicy, ItemCounter, LineCrossingTracker, PerFrameCounter};
pub use detect::{
    BoundingBox, Detection, DetectorBackend, InferenceOptions, ItemClass, StubBackend,
};
pub use error::PipelineError;
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, ScriptedSource, SourceSettings, VideoOrigin};
pub use pipeline::{DetectionLoop, LoopState, PipelineEvent, PipelineSettings};
pub use report::{ReportRow, ReportStore};

/// A committed decision that one physical item is damaged or intact.
///
/// Emitted once per qualifying detection (per processed frame, or per
/// line crossing, depending on the counting policy). Immutable once
/// emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationEvent {
    pub timestamp: DateTime<Utc>,
    pub class: ItemClass,
    pub detail: String,
}

impl ClassificationEvent {
    /// Commit a classification at the current wall-clock time.
    pub fn now(class: ItemClass) -> Self {
        Self {
            timestamp: Utc::now(),
            class,
            detail: class.detail().to_string(),
        }
    }
}

/// Metrics for one processed frame.
///
/// `damaged` and `intact` are running totals of committed classifications
/// for the run, so `damaged + intact` equals the total item count at every
/// frame under either counting policy.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSummary {
    /// 1-based index over consumed frames (skipped frames count too).
    pub frame_index: u64,
    /// Detections reported for this frame after confidence filtering.
    pub objects_detected: usize,
    /// Wall time spent in inference and counting for this frame.
    pub processing_time: Duration,
    pub damaged: u64,
    pub intact: u64,
}

impl FrameSummary {
    pub fn total(&self) -> u64 {
        self.damaged + self.intact
    }
}
