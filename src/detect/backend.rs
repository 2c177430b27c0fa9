use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Options passed to every `infer` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceOptions {
    /// Minimum confidence for a detection to be reported. Validated to
    /// (0, 1] by configuration loading.
    pub confidence_threshold: f32,
    /// When true, non-max suppression merges overlapping boxes across
    /// classes, not only within a class.
    pub agnostic_nms: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            agnostic_nms: false,
        }
    }
}

/// Object-detection backend trait.
///
/// Inference is synchronous and blocking for the duration of one frame.
/// An `Err` from `infer` is fatal to the current run: the pipeline logs
/// it and stops, with no retry. Implementations must not retain the
/// frame beyond the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, honoring the suppression settings.
    fn infer(&mut self, frame: &Frame, opts: &InferenceOptions) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run before the first frame. An `Err` here
    /// is treated as a model-load failure and the loop refuses to start.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
