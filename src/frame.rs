//! Video frame buffer.

use anyhow::{anyhow, Result};

/// Immutable pixel buffer produced by a frame source.
///
/// `seq` increases monotonically per source. Frames are consumed by the
/// pipeline and dropped after detection; nothing retains them.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub seq: u64,
}

impl Frame {
    /// Create a frame. `data` must hold exactly
    /// `width * height * channels` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, seq: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels as usize))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} bytes for a {}x{}x{} frame, received {}",
                expected,
                width,
                height,
                channels,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            seq,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Same dimensions and sequence number, replaced pixel data.
    /// Used by the annotation overlay, which edits a copy.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            seq: self.seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        let err = Frame::new(vec![0u8; 10], 4, 4, 3, 0).unwrap_err();
        assert!(err.to_string().contains("expected 48 bytes"));
    }

    #[test]
    fn frame_accepts_exact_buffer() {
        let frame = Frame::new(vec![0u8; 48], 4, 4, 3, 7).expect("valid frame");
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.data().len(), 48);
    }
}
