//! camface-core: face data model and detection adapter.
//!
//! Uses SCRFD for face detection and ArcFace for face encodings, both
//! running on ONNX Runtime for CPU inference.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{load_image_from_path, AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use types::{compare, BoundingBox, FaceEncoding, FaceRegion, LandmarkSet, DEFAULT_TOLERANCE};

/// SCRFD detection model file name.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// `$XDG_DATA_HOME/camface/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("camface")
        .join("models")
}
