//! Synthetic and scripted frame sources.

use std::collections::VecDeque;

use anyhow::Result;

use super::{FrameSource, SourceSettings};
use crate::frame::Frame;

/// Endless synthetic source for `stub://` origins.
///
/// Generates a shifting pixel pattern so the hash-keyed stub detector
/// sees scene changes. Never reports end-of-stream until closed.
pub struct SyntheticSource {
    name: String,
    settings: SourceSettings,
    seq: u64,
    scene_state: u8,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(name: &str, settings: &SourceSettings) -> Self {
        log::info!("SyntheticSource: connected to stub://{}", name);
        Self {
            name: name.to_string(),
            settings: settings.clone(),
            seq: 0,
            scene_state: 0,
            closed: false,
        }
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count =
            (self.settings.width as usize) * (self.settings.height as usize) * 3;
        if self.seq % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.seq + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        self.seq += 1;
        let pixels = self.generate_pixels();
        let frame = Frame::new(
            pixels,
            self.settings.width,
            self.settings.height,
            3,
            self.seq,
        )?;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if !self.closed {
            log::info!("SyntheticSource: closed stub://{}", self.name);
        }
        self.closed = true;
    }
}

/// Finite source replaying a fixed frame sequence, for tests.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    closed: bool,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
            closed: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames.clear();
    }
}
