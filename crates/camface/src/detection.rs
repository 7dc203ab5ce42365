//! Downscaled detection passes, mapped back to full-frame coordinates.

use camface_core::{FaceAnalyzer, FaceEncoding, FaceRegion, LandmarkSet};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::borrow::Cow;

use crate::app::ActionError;

/// Shrink `image` by an integer factor for a faster detection pass.
pub fn downscale(image: &RgbImage, factor: u32) -> Cow<'_, RgbImage> {
    if factor <= 1 {
        return Cow::Borrowed(image);
    }
    let w = (image.width() / factor).max(1);
    let h = (image.height() / factor).max(1);
    Cow::Owned(imageops::resize(image, w, h, FilterType::Triangle))
}

fn factor_i32(factor: u32) -> i32 {
    factor.max(1) as i32
}

/// Face regions in full-frame coordinates.
pub fn locate_faces(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
    factor: u32,
) -> Result<Vec<FaceRegion>, ActionError> {
    let small = downscale(image, factor);
    let regions = analyzer.locate_faces(&small)?;
    let f = factor_i32(factor);
    Ok(regions.iter().map(|r| r.scaled(f)).collect())
}

/// Regions and landmark sets from one downscaled pass. Both lists come from
/// the same pass so callers can replace them together.
pub fn locate_faces_and_landmarks(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
    factor: u32,
) -> Result<(Vec<FaceRegion>, Vec<LandmarkSet>), ActionError> {
    let small = downscale(image, factor);
    let regions = analyzer.locate_faces(&small)?;
    let landmarks = analyzer.locate_landmarks(&small)?;
    let f = factor_i32(factor);
    Ok((
        regions.iter().map(|r| r.scaled(f)).collect(),
        landmarks.iter().map(|l| l.scaled(f)).collect(),
    ))
}

/// Regions (full-frame coordinates) and their encodings from one downscaled
/// pass. Encoding is skipped when no face is found.
pub fn locate_and_encode(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
    factor: u32,
) -> Result<(Vec<FaceRegion>, Vec<FaceEncoding>), ActionError> {
    let small = downscale(image, factor);
    let regions = analyzer.locate_faces(&small)?;
    if regions.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let encodings = analyzer.encode_faces(&small, &regions)?;
    let f = factor_i32(factor);
    Ok((regions.iter().map(|r| r.scaled(f)).collect(), encodings))
}
