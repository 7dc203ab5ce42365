use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance used by the face lock when comparing encodings.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Raw detector output in frame pixel space, with five-point keypoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Integer pixel bounds of one detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceRegion {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Map a region found on a downscaled image back to full resolution.
    pub fn scaled(&self, factor: i32) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }

    /// Convert a detector box to a region trimmed to the image bounds.
    pub fn from_bbox(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let max_x = width as f32;
        let max_y = height as f32;
        Self {
            top: bbox.y.round().clamp(0.0, max_y) as i32,
            right: (bbox.x + bbox.width).round().clamp(0.0, max_x) as i32,
            bottom: (bbox.y + bbox.height).round().clamp(0.0, max_y) as i32,
            left: bbox.x.round().clamp(0.0, max_x) as i32,
        }
    }

    /// Intersection-over-union with a detector box.
    pub fn iou(&self, bbox: &BoundingBox) -> f32 {
        let x1 = (self.left as f32).max(bbox.x);
        let y1 = (self.top as f32).max(bbox.y);
        let x2 = (self.right as f32).min(bbox.x + bbox.width);
        let y2 = (self.bottom as f32).min(bbox.y + bbox.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let area_a = (self.width().max(0) * self.height().max(0)) as f32;
        let area_b = bbox.width * bbox.height;
        let union = area_a + area_b - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Named groups of facial feature points for one face.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub features: BTreeMap<String, Vec<(i32, i32)>>,
}

impl LandmarkSet {
    /// Group five detector keypoints into named features.
    pub fn from_keypoints(points: &[(f32, f32); 5]) -> Self {
        let p = |i: usize| (points[i].0.round() as i32, points[i].1.round() as i32);
        let mut features = BTreeMap::new();
        features.insert("left_eye".to_string(), vec![p(0)]);
        features.insert("right_eye".to_string(), vec![p(1)]);
        features.insert("nose_tip".to_string(), vec![p(2)]);
        features.insert("mouth".to_string(), vec![p(3), p(4)]);
        Self { features }
    }

    pub fn scaled(&self, factor: i32) -> Self {
        let features = self
            .features
            .iter()
            .map(|(name, points)| {
                let points = points.iter().map(|&(x, y)| (x * factor, y * factor)).collect();
                (name.clone(), points)
            })
            .collect();
        Self { features }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(i32, i32)])> {
        self.features.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Face identity vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEncoding {
    pub values: Vec<f32>,
}

impl FaceEncoding {
    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &FaceEncoding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Cosine distance in [0, 2]. Zero for identical directions.
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// Whether `candidate` is the same face as `reference` within `tolerance`.
pub fn compare(reference: &FaceEncoding, candidate: &FaceEncoding, tolerance: f32) -> bool {
    reference.distance(candidate) <= tolerance
}
