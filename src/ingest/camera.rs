//! Live camera frame source.
//!
//! Captures from a local V4L2 device node (feature: ingest-v4l2). The
//! device is selected by index (`/dev/video{N}`). Without the feature a
//! camera origin is a configuration error at open time.

use anyhow::Result;
#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;

use super::{FrameSource, SourceSettings};
use crate::frame::Frame;

/// Camera frame source.
pub struct CameraSource {
    #[cfg(feature = "ingest-v4l2")]
    inner: device::DeviceCameraSource,
    #[cfg(not(feature = "ingest-v4l2"))]
    never: std::convert::Infallible,
}

impl CameraSource {
    /// Open the camera at `index`. A failed open is fatal: the run never
    /// starts.
    #[cfg(feature = "ingest-v4l2")]
    pub fn open(index: u32, settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            inner: device::DeviceCameraSource::open(index, settings)?,
        })
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    pub fn open(index: u32, _settings: &SourceSettings) -> Result<Self> {
        anyhow::bail!(
            "camera {} requires the ingest-v4l2 feature; use a stub:// source instead",
            index
        )
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        #[cfg(feature = "ingest-v4l2")]
        {
            self.inner.next_frame()
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        match self.never {}
    }

    fn close(&mut self) {
        #[cfg(feature = "ingest-v4l2")]
        self.inner.close();
        #[cfg(not(feature = "ingest-v4l2"))]
        match self.never {}
    }
}

#[cfg(feature = "ingest-v4l2")]
mod device {
    use super::*;
    use ouroboros::self_referencing;

    pub(super) struct DeviceCameraSource {
        index: u32,
        state: Option<DeviceState>,
        width: u32,
        height: u32,
        seq: u64,
    }

    #[self_referencing]
    struct DeviceState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCameraSource {
        pub(super) fn open(index: u32, settings: &SourceSettings) -> Result<Self> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let device = v4l::Device::new(index as usize)
                .with_context(|| format!("open v4l2 device {}", index))?;

            let mut format = device.format().context("read v4l2 format")?;
            format.width = settings.width;
            format.height = settings.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");
            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!("CameraSource: failed to set format on camera {}: {}", index, err);
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            if settings.target_fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
                if let Err(err) = device.set_params(&params) {
                    log::warn!("CameraSource: failed to set fps on camera {}: {}", index, err);
                }
            }

            let width = format.width;
            let height = format.height;

            let state = DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!("CameraSource: connected to camera {} ({}x{})", index, width, height);

            Ok(Self {
                index,
                state: Some(state),
                width,
                height,
                seq: 0,
            })
        }

        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
            use v4l::io::traits::CaptureStream;

            let Some(state) = self.state.as_mut() else {
                return Ok(None);
            };
            // The mmap buffer only lives for the with_mut borrow; copy out.
            let pixels = state
                .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
                .context("capture v4l2 frame")?;

            self.seq += 1;
            let frame = Frame::new(pixels, self.width, self.height, 3, self.seq)?;
            Ok(Some(frame))
        }

        pub(super) fn close(&mut self) {
            if self.state.take().is_some() {
                log::info!("CameraSource: closed camera {}", self.index);
            }
        }
    }
}
