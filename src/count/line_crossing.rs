//! Line-crossing item tracker.
//!
//! Identity is the rounded horizontal midpoint of a detection's box,
//! stable only while boxes stay put between consecutive frames. This is
//! an accepted approximation, not an exact tracker: two detections that
//! round to the same midpoint collide, and the last write wins.

use std::collections::HashMap;

use crate::count::ItemCounter;
use crate::detect::Detection;
use crate::ClassificationEvent;

/// Last known vertical extent of a tracked identity. The committed class
/// comes from the crossing frame's detection, so nothing older than the
/// previous bottom edge needs to be remembered.
#[derive(Clone, Copy, Debug)]
struct TrackedObject {
    /// Bottom edge (y2) as of the previous frame.
    bottom: f32,
}

/// Commits one event per item, at the frame where its bottom edge moves
/// from strictly above the boundary to at-or-below it. The boundary sits
/// at `line_fraction` of the frame height.
pub struct LineCrossingTracker {
    line_fraction: f32,
    tracks: HashMap<i64, TrackedObject>,
}

impl LineCrossingTracker {
    pub fn new(line_fraction: f32) -> Self {
        Self {
            line_fraction,
            tracks: HashMap::new(),
        }
    }

    fn identifier(detection: &Detection) -> i64 {
        detection.bbox.mid_x().round() as i64
    }
}

impl ItemCounter for LineCrossingTracker {
    fn observe(&mut self, detections: &[Detection], frame_height: u32) -> Vec<ClassificationEvent> {
        let boundary = self.line_fraction * frame_height as f32;
        let mut events = Vec::new();
        let mut current: HashMap<i64, TrackedObject> = HashMap::with_capacity(detections.len());

        for detection in detections {
            let id = Self::identifier(detection);
            let bottom = detection.bbox.bottom();

            // Downward crossings only; first sightings never emit.
            if let Some(previous) = self.tracks.get(&id) {
                if previous.bottom < boundary && bottom >= boundary {
                    events.push(ClassificationEvent::now(detection.class));
                }
            }

            // Position updates regardless of crossing; identifier
            // collisions within a frame resolve last-write-wins.
            current.insert(id, TrackedObject { bottom });
        }

        // Identifiers absent from this frame are evicted, no grace period.
        self.tracks = current;
        events
    }
}
