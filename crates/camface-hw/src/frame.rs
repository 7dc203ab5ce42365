//! Frame type and pixel conversion: YUYV to RGB, display colour order.

use image::{Rgb, RgbImage};

/// A captured RGB camera frame. Cloning is a deep copy of the pixels.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        Self {
            image,
            timestamp: std::time::Instant::now(),
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Channel order expected by a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ColorOrder {
    /// Reorder an RGB image's channels for this colour order.
    pub fn convert(self, image: &RgbImage) -> RgbImage {
        match self {
            ColorOrder::Rgb => image.clone(),
            ColorOrder::Bgr => {
                let mut out = image.clone();
                for px in out.pixels_mut() {
                    px.0.swap(0, 2);
                }
                out
            }
        }
    }
}

/// Convert packed YUYV (4:2:2) to RGB with BT.601 integer coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1], chunk[3]);
        for y in [chunk[0], chunk[2]] {
            data.extend_from_slice(&ycbcr_to_rgb(y, u, v).0);
        }
    }
    RgbImage::from_raw(width, height, data).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    Rgb([
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ])
}

/// Interpret a packed RGB24 buffer.
pub fn rgb24_to_image(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 3) as usize;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    RgbImage::from_raw(width, height, buf[..expected].to_vec()).ok_or(FrameError::InvalidLength {
        expected,
        actual: buf.len(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_grey_pixels() {
        // Neutral chroma: Y=16 is black, Y=235 is white.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_yuyv_red_dominant() {
        // High Cr pushes red up and green down.
        let yuyv = vec![81, 90, 81, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        let px = rgb.get_pixel(0, 0);
        assert!(px[0] > 200 && px[1] < 60 && px[2] < 60, "got {px:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_yuyv_output_dimensions() {
        let yuyv: Vec<u8> = vec![128; 4 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
    }

    #[test]
    fn test_rgb24_to_image() {
        let img = rgb24_to_image(&[1, 2, 3, 4, 5, 6], 2, 1).unwrap();
        assert_eq!(img.get_pixel(1, 0), &Rgb([4, 5, 6]));
        assert!(rgb24_to_image(&[1, 2, 3], 2, 1).is_err());
    }

    #[test]
    fn test_color_order_bgr_swaps_channels() {
        let img = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        assert_eq!(ColorOrder::Bgr.convert(&img).get_pixel(0, 0), &Rgb([30, 20, 10]));
        assert_eq!(ColorOrder::Rgb.convert(&img).get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_frame_clone_is_deep() {
        let frame = Frame::new(RgbImage::from_pixel(2, 2, Rgb([1, 1, 1])), 7);
        let mut copy = frame.clone();
        copy.image.put_pixel(0, 0, Rgb([9, 9, 9]));
        assert_eq!(frame.image.get_pixel(0, 0), &Rgb([1, 1, 1]));
        assert_eq!(copy.sequence, 7);
    }
}
