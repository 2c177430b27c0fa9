//! Terminal failure causes for an inspection run.
//!
//! Every variant ends the current run (or prevents it from starting).
//! None of them crash the process and none are retried; the pipeline
//! logs the cause and transitions to Stopped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The video source could not be opened. The run never starts.
    #[error("failed to open video source: {0}")]
    SourceOpen(#[source] anyhow::Error),

    /// A hard read failure from the source. The run stops cleanly.
    #[error("video source read failed: {0}")]
    SourceRead(#[source] anyhow::Error),

    /// Model weights could not be loaded or warmed up. The loop refuses
    /// to start.
    #[error("failed to load detection model: {0}")]
    ModelLoad(#[source] anyhow::Error),

    /// Inference failed on a frame. Fatal to the current run, no retry.
    #[error("inference failed: {0}")]
    Inference(#[source] anyhow::Error),
}
