//! The detection adapter consumed by the apps.
//!
//! `FaceAnalyzer` is the seam between the capture loop and the face models:
//! the apps only ever see regions, landmark sets and encodings.

use crate::alignment;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, FaceEncoding, FaceRegion, LandmarkSet};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum overlap for a requested region to reuse a detection's keypoints.
const KEYPOINT_MATCH_IOU: f32 = 0.3;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Face detection, landmark extraction and encoding over RGB images.
pub trait FaceAnalyzer {
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError>;

    fn locate_landmarks(&mut self, image: &RgbImage) -> Result<Vec<LandmarkSet>, AnalyzerError>;

    /// One encoding per region, in the order given.
    fn encode_faces(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, AnalyzerError>;
}

/// Decode an image file into RGB.
pub fn load_image_from_path(path: &Path) -> Result<RgbImage, AnalyzerError> {
    if !path.exists() {
        return Err(AnalyzerError::NotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// SCRFD + ArcFace implementation of [`FaceAnalyzer`].
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
        let (w, h) = image.dimensions();
        let boxes = self.detector.detect(image)?;
        Ok(boxes.iter().map(|b| FaceRegion::from_bbox(b, w, h)).collect())
    }

    fn locate_landmarks(&mut self, image: &RgbImage) -> Result<Vec<LandmarkSet>, AnalyzerError> {
        let boxes = self.detector.detect(image)?;
        Ok(boxes
            .iter()
            .filter_map(|b| b.landmarks.as_ref())
            .map(LandmarkSet::from_keypoints)
            .collect())
    }

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, AnalyzerError> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let boxes = self.detector.detect(image)?;
        regions
            .iter()
            .map(|region| {
                let keypoints = keypoints_for(region, &boxes);
                Ok(self.recognizer.encode(image, &keypoints)?)
            })
            .collect()
    }
}

/// Keypoints of the best-overlapping detection, or estimated from the box.
fn keypoints_for(region: &FaceRegion, boxes: &[BoundingBox]) -> [(f32, f32); 5] {
    boxes
        .iter()
        .filter_map(|b| b.landmarks.map(|lms| (region.iou(b), lms)))
        .filter(|(iou, _)| *iou >= KEYPOINT_MATCH_IOU)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, lms)| lms)
        .unwrap_or_else(|| {
            tracing::debug!(?region, "no detection overlaps region; estimating keypoints from box");
            alignment::keypoints_from_region(region)
        })
}
