//! Recorded-file frame source.
//!
//! Decodes frames from a local video file in-memory. `stub://` paths get
//! a synthetic backend so file-driven code paths stay testable without
//! media fixtures; real paths require the ingest-file-ffmpeg feature.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceSettings, SyntheticSource};
use crate::frame::Frame;

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open a local video file. Fails immediately on a bad path or a
    /// file ffmpeg cannot read; the caller must not enter the run state.
    pub fn open(path: &str, settings: &SourceSettings) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(anyhow!("file source path must not be empty"));
        }
        if let Some(name) = path.strip_prefix("stub://") {
            return Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(name, settings)),
            });
        }
        if path.contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path, settings)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            let _ = settings;
            Err(anyhow!(
                "file ingestion requires the ingest-file-ffmpeg feature"
            ))
        }
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource").finish_non_exhaustive()
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.close(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.close(),
        }
    }
}
