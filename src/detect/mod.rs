mod backend;
mod backends;
mod result;

pub use backend::{DetectorBackend, InferenceOptions};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, ItemClass};

/// Greedy non-max suppression over confidence-sorted detections.
///
/// With `agnostic` set, overlapping boxes suppress each other regardless
/// of class; otherwise suppression only applies within a class.
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    agnostic: bool,
) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept.iter().any(|winner| {
            (agnostic || winner.class == candidate.class)
                && winner.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
