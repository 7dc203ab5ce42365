//! One-shot analysis of a still image, printed as JSON by `camface detect`.

use crate::app::ActionError;
use camface_core::{load_image_from_path, FaceAnalyzer, FaceRegion, LandmarkSet};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct FaceReport {
    pub region: FaceRegion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FaceReport>,
    pub landmarks: Vec<LandmarkSet>,
}

pub fn inspect_image(
    analyzer: &mut dyn FaceAnalyzer,
    path: &Path,
    encode: bool,
) -> Result<ImageReport, ActionError> {
    let image = load_image_from_path(path)?;
    let regions = analyzer.locate_faces(&image)?;
    let landmarks = analyzer.locate_landmarks(&image)?;

    let mut encodings: Vec<Option<Vec<f32>>> = if encode && !regions.is_empty() {
        analyzer.encode_faces(&image, &regions)?.into_iter().map(|e| Some(e.values)).collect()
    } else {
        Vec::new()
    };
    encodings.resize(regions.len(), None);

    tracing::debug!(path = %path.display(), faces = regions.len(), "image inspected");

    Ok(ImageReport {
        path: path.to_path_buf(),
        width: image.width(),
        height: image.height(),
        faces: regions
            .into_iter()
            .zip(encodings)
            .map(|(region, encoding)| FaceReport { region, encoding })
            .collect(),
        landmarks,
    })
}
