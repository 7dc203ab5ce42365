//! Frame sources consumed by the capture loop.

use crate::camera::CameraError;
use crate::frame::Frame;
use image::RgbImage;
use std::path::Path;

/// Something that yields one frame per poll.
pub trait FrameSource {
    /// Read the next frame. Failures are per-read; the source stays usable.
    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Release the underlying device. Further reads fail with `Released`.
    fn release(&mut self);
}

/// Replays a single still image as an endless frame stream.
pub struct StillSource {
    image: Option<RgbImage>,
    sequence: u32,
}

impl StillSource {
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        let image = image::open(path)
            .map_err(|e| CameraError::DeviceNotFound(format!("{}: {e}", path.display())))?
            .to_rgb8();
        tracing::info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "opened still source"
        );
        Ok(Self::from_image(image))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image: Some(image), sequence: 0 }
    }
}

impl FrameSource for StillSource {
    fn read(&mut self) -> Result<Frame, CameraError> {
        let image = self.image.as_ref().ok_or(CameraError::Released)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Frame::new(image.clone(), self.sequence))
    }

    fn release(&mut self) {
        self.image = None;
    }
}
