//! Counting policies.
//!
//! A counter converts raw per-frame detections into committed
//! `ClassificationEvent`s, deduplicating a single physical item across
//! the many frames it is visible in. Two policies are supported:
//!
//! - per-frame: every detection in every processed frame commits an
//!   event immediately (a slow item generates duplicates);
//! - line-crossing: an event commits only when a tracked item's bottom
//!   edge crosses a horizontal boundary downward.
//!
//! The trait seam exists so the identity heuristic can be swapped (an
//! IoU matcher, for instance) without touching the detection loop.

mod line_crossing;

pub use line_crossing::LineCrossingTracker;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::detect::Detection;
use crate::ClassificationEvent;

/// How detections are turned into per-item classification events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountingPolicy {
    PerFrame,
    LineCrossing,
}

impl CountingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountingPolicy::PerFrame => "per-frame",
            CountingPolicy::LineCrossing => "line-crossing",
        }
    }
}

impl fmt::Display for CountingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountingPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-frame" => Ok(CountingPolicy::PerFrame),
            "line-crossing" => Ok(CountingPolicy::LineCrossing),
            other => Err(anyhow!(
                "unknown counting policy '{}' (expected per-frame or line-crossing)",
                other
            )),
        }
    }
}

/// Folds one processed frame's detections into zero or more committed
/// classification events. Owned exclusively by the processing thread.
pub trait ItemCounter: Send {
    fn observe(&mut self, detections: &[Detection], frame_height: u32) -> Vec<ClassificationEvent>;
}

/// Commits one event per detection per processed frame.
pub struct PerFrameCounter;

impl ItemCounter for PerFrameCounter {
    fn observe(
        &mut self,
        detections: &[Detection],
        _frame_height: u32,
    ) -> Vec<ClassificationEvent> {
        detections
            .iter()
            .map(|d| ClassificationEvent::now(d.class))
            .collect()
    }
}

/// Build the counter selected by configuration.
pub fn counter_for(policy: CountingPolicy, line_fraction: f32) -> Box<dyn ItemCounter> {
    match policy {
        CountingPolicy::PerFrame => Box::new(PerFrameCounter),
        CountingPolicy::LineCrossing => Box::new(LineCrossingTracker::new(line_fraction)),
    }
}
