#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, InferenceOptions};
use crate::detect::result::{BoundingBox, Detection, ItemClass};
use crate::detect::non_max_suppression;
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file and performs inference on RGB frames. The
/// model is expected to emit one `[1, N, 6]` tensor of
/// `(x1, y1, x2, y2, confidence, class)` rows in input-pixel
/// coordinates, class 0 meaning damaged and class 1 intact. No network
/// I/O happens beyond loading the weights from disk.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load ONNX weights from disk and prepare a runnable plan. A failure
    /// here is a model-load failure: the pipeline refuses to start.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }
        if frame.channels != 3 {
            return Err(anyhow!(
                "model input requires 3 channels, frame has {}",
                frame.channels
            ));
        }

        let width = frame.width as usize;
        let pixels = frame.data();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, frame.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = rows.shape();
        if shape.len() != 3 || shape[2] < 6 {
            return Err(anyhow!(
                "unexpected model output shape {:?}, want [1, N, 6]",
                shape
            ));
        }

        let mut detections = Vec::new();
        for row in rows.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
            let confidence = row[4];
            if !confidence.is_finite() {
                continue;
            }
            let class = if row[5] < 0.5 {
                ItemClass::Damaged
            } else {
                ItemClass::Intact
            };
            detections.push(Detection::new(
                BoundingBox::new(row[0], row[1], row[2], row[3]),
                class,
                confidence,
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame, opts: &InferenceOptions) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self
            .decode_output(outputs)?
            .into_iter()
            .filter(|d| d.confidence >= opts.confidence_threshold)
            .collect();
        Ok(non_max_suppression(
            detections,
            NMS_IOU_THRESHOLD,
            opts.agnostic_nms,
        ))
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = Tensor::zero::<f32>(&[1, 3, self.height as usize, self.width as usize])
            .context("failed to allocate warm-up tensor")?;
        self.model
            .run(tvec!(zeros.into()))
            .context("model warm-up inference failed")?;
        Ok(())
    }
}
