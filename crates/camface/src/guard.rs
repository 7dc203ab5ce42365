//! Face lock: a reference face saved from the feed or loaded from disk, and a
//! badge that flips between locked and unlocked as matching faces come and go.

use crate::app::{ActionError, App, Command, Status, Update};
use crate::badge::{badge_color, render_badge};
use crate::cadence::Cadence;
use crate::detection;
use crate::match_engine::{LockState, MatchEngine};
use crate::render::{self, Painter};
use camface_core::{load_image_from_path, FaceAnalyzer, FaceEncoding, FaceRegion};
use camface_hw::Frame;
use image::{imageops, Rgb, RgbImage};
use std::path::{Path, PathBuf};

pub const SAVED_FACE_FILE: &str = "saved_face.jpg";
pub const LOADED_FACE_FILE: &str = "loaded_face.jpg";
const PREVIEW_SIDE: u32 = 150;

/// Crop `region` out of `image`, clamped to its bounds.
pub fn crop_region(image: &RgbImage, region: &FaceRegion) -> Option<RgbImage> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let left = (region.left as i64).clamp(0, w);
    let right = (region.right as i64).clamp(0, w);
    let top = (region.top as i64).clamp(0, h);
    let bottom = (region.bottom as i64).clamp(0, h);
    if right <= left || bottom <= top {
        return None;
    }
    let (width, height) = ((right - left) as u32, (bottom - top) as u32);
    Some(imageops::crop_imm(image, left as u32, top as u32, width, height).to_image())
}

/// Encoding of the first face found in the image file at `path`.
pub fn derive_encoding(
    analyzer: &mut dyn FaceAnalyzer,
    path: &Path,
) -> Result<FaceEncoding, ActionError> {
    let image = load_image_from_path(path)?;
    let regions = analyzer.locate_faces(&image)?;
    if regions.is_empty() {
        tracing::warn!(path = %path.display(), "no face found in saved crop");
        return Err(ActionError::NoEncoding);
    }
    analyzer
        .encode_faces(&image, &regions[..1])?
        .into_iter()
        .next()
        .ok_or(ActionError::NoEncoding)
}

/// App 3: face lock.
pub struct GuardApp {
    painter: Painter,
    cadence: Cadence,
    downscale: u32,
    engine: MatchEngine,
    reference_dir: PathBuf,
    last_frame: Option<Frame>,
    regions: Vec<FaceRegion>,
}

impl GuardApp {
    pub fn new(
        painter: Painter,
        cadence: Cadence,
        downscale: u32,
        tolerance: f32,
        reference_dir: PathBuf,
    ) -> Self {
        tracing::debug!(interval = cadence.interval(), downscale, tolerance, "guard app");
        Self {
            painter,
            cadence,
            downscale,
            engine: MatchEngine::new(tolerance),
            reference_dir,
            last_frame: None,
            regions: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// Save the first face of the latest frame as the new reference.
    pub fn save_current_face(
        &mut self,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        let image = self.last_frame.as_ref().ok_or(ActionError::NoFrame)?.image.clone();
        let face = self.adopt_reference(analyzer, &image, SAVED_FACE_FILE)?;
        Ok(reference_update(&face, "Face saved successfully!"))
    }

    /// Use the first face of the image at `path` as the new reference.
    pub fn load_face_from_file(
        &mut self,
        analyzer: &mut dyn FaceAnalyzer,
        path: &Path,
    ) -> Result<Update, ActionError> {
        let image = load_image_from_path(path)?;
        tracing::info!(path = %path.display(), "loading reference face");
        let face = self
            .adopt_reference(analyzer, &image, LOADED_FACE_FILE)
            .map_err(|e| match e {
                ActionError::NoFaceDetected => ActionError::NoFaceInImage,
                other => other,
            })?;
        Ok(reference_update(&face, "Face loaded successfully!"))
    }

    /// Locate, crop, persist and encode. The reference only changes once
    /// every step has succeeded.
    fn adopt_reference(
        &mut self,
        analyzer: &mut dyn FaceAnalyzer,
        image: &RgbImage,
        file_name: &str,
    ) -> Result<RgbImage, ActionError> {
        let regions = analyzer.locate_faces(image)?;
        let face = regions
            .first()
            .and_then(|region| crop_region(image, region))
            .ok_or(ActionError::NoFaceDetected)?;

        std::fs::create_dir_all(&self.reference_dir)?;
        let path = self.reference_dir.join(file_name);
        face.save(&path)?;
        tracing::info!(
            path = %path.display(),
            width = face.width(),
            height = face.height(),
            "reference face written"
        );

        let encoding = derive_encoding(analyzer, &path)?;
        self.engine.set_reference(encoding);
        Ok(face)
    }
}

fn reference_update(face: &RgbImage, text: &str) -> Update {
    Update {
        status: Some(Status::success(text)),
        preview: Some(render::thumbnail(face, PREVIEW_SIDE)),
        ..Default::default()
    }
}

impl App for GuardApp {
    fn name(&self) -> &'static str {
        "guard"
    }

    fn initial_update(&self) -> Update {
        Update {
            status: Some(Status::info("Ready - Capture or load a face to begin")),
            badge: Some(render_badge(LockState::Unauthorized, &self.painter)),
            ..Default::default()
        }
    }

    fn tick(
        &mut self,
        frame: Frame,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        self.last_frame = Some(frame.clone());
        let mut update = Update::default();

        if self.cadence.should_run() && self.engine.has_reference() {
            let pass = detection::locate_and_encode(analyzer, &frame.image, self.downscale);
            let (regions, encodings) = match pass {
                Ok(pass) => pass,
                Err(e) => {
                    self.regions.clear();
                    return Ok(Update::detection_failed(frame.image, &e));
                }
            };
            self.regions = regions;
            if let Some(transition) = self.engine.evaluate(&encodings) {
                update.status = Some(transition.status());
                update.badge = Some(render_badge(transition.state, &self.painter));
            }
        }

        let color = badge_color(self.engine.state());
        let color = Rgb([color[0], color[1], color[2]]);
        let mut display = frame.image;
        for region in &self.regions {
            render::draw_region(&mut display, region, color);
        }
        update.frame = Some(display);
        Ok(update)
    }

    fn handle(
        &mut self,
        command: &Command,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        match command {
            Command::SaveFace => self.save_current_face(analyzer),
            Command::LoadFace(path) => self.load_face_from_file(analyzer, path),
            other => Err(ActionError::Unsupported {
                command: other.name(),
                app: self.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{encoding, frame, FakeAnalyzer};
    use crate::app::StatusLevel;
    use camface_core::DEFAULT_TOLERANCE;

    fn face_analyzer() -> FakeAnalyzer {
        FakeAnalyzer {
            regions: vec![FaceRegion::new(100, 300, 300, 100)],
            encodings: vec![encoding(&[1.0, 0.0, 0.0])],
            ..Default::default()
        }
    }

    fn app(dir: &Path) -> GuardApp {
        GuardApp::new(Painter::new(None), Cadence::new(2), 4, DEFAULT_TOLERANCE, dir.to_path_buf())
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = RgbImage::new(100, 80);
        let face = crop_region(&img, &FaceRegion::new(-10, 120, 50, 60)).unwrap();
        assert_eq!(face.dimensions(), (40, 50));
        assert!(crop_region(&img, &FaceRegion::new(90, 10, 95, 200)).is_none());
    }

    #[test]
    fn test_initial_update_shows_locked_badge() {
        let dir = tempfile::tempdir().unwrap();
        let update = app(dir.path()).initial_update();
        assert_eq!(update.status, Some(Status::info("Ready - Capture or load a face to begin")));
        let badge = update.badge.unwrap();
        assert_eq!(badge.get_pixel(150, 20), &badge_color(LockState::Unauthorized));
    }

    #[test]
    fn test_tick_without_reference_skips_matching() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        for _ in 0..4 {
            let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
            assert!(update.status.is_none() && update.badge.is_none());
            assert!(update.frame.is_some());
        }
        assert_eq!(analyzer.locate_calls, 0);
        assert_eq!(app.engine().state(), LockState::Unauthorized);
    }

    #[test]
    fn test_save_without_frame() {
        let dir = tempfile::tempdir().unwrap();
        let err = app(dir.path()).handle(&Command::SaveFace, &mut face_analyzer()).unwrap_err();
        assert!(matches!(err, ActionError::NoFrame));
    }

    #[test]
    fn test_save_without_face_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = FakeAnalyzer::default();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();

        let err = app.handle(&Command::SaveFace, &mut analyzer).unwrap_err();
        assert!(matches!(err, ActionError::NoFaceDetected));
        assert!(!app.engine().has_reference());
        assert!(!dir.path().join(SAVED_FACE_FILE).exists());
    }

    #[test]
    fn test_save_current_face_sets_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();

        let update = app.handle(&Command::SaveFace, &mut analyzer).unwrap();
        assert_eq!(update.status, Some(Status::success("Face saved successfully!")));
        assert_eq!(update.preview.unwrap().dimensions(), (150, 150));
        assert_eq!(image::image_dimensions(dir.path().join(SAVED_FACE_FILE)).unwrap(), (200, 200));
        assert_eq!(app.engine().reference(), Some(&encoding(&[1.0, 0.0, 0.0])));
    }

    #[test]
    fn test_failed_encoding_leaves_reference_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        app.handle(&Command::SaveFace, &mut analyzer).unwrap();

        analyzer.encodings.clear();
        let err = app.handle(&Command::SaveFace, &mut analyzer).unwrap_err();
        assert!(matches!(err, ActionError::NoEncoding));
        assert_eq!(app.engine().reference(), Some(&encoding(&[1.0, 0.0, 0.0])));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let missing = dir.path().join("nobody.jpg");
        let err = app.handle(&Command::LoadFace(missing), &mut face_analyzer()).unwrap_err();
        assert!(matches!(err, ActionError::Analyzer(camface_core::AnalyzerError::NotFound(_))));
        assert!(!dir.path().join(LOADED_FACE_FILE).exists());
    }

    #[test]
    fn test_load_file_without_face() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("landscape.png");
        RgbImage::from_pixel(400, 400, Rgb([20, 120, 40])).save(&source).unwrap();

        let mut app = app(dir.path());
        let err = app.handle(&Command::LoadFace(source), &mut FakeAnalyzer::default()).unwrap_err();
        assert!(matches!(err, ActionError::NoFaceInImage));
        assert_eq!(err.status(), Status::error("No face found in the image!"));
        assert!(!dir.path().join(LOADED_FACE_FILE).exists());
        assert!(!app.engine().has_reference());
    }

    #[test]
    fn test_failed_match_pass_keeps_state_and_clears_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        app.handle(&Command::SaveFace, &mut analyzer).unwrap();
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(app.engine().state(), LockState::Authorized);

        analyzer.broken = true;
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(update.status.unwrap().level, StatusLevel::Error);
        assert!(update.badge.is_none());
        assert_eq!(update.frame.unwrap().get_pixel(400, 400), &Rgb([90, 90, 90]));
        assert_eq!(app.engine().state(), LockState::Authorized);

        // Skipped tick after the failure draws no stale boxes.
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(update.frame.unwrap().get_pixel(400, 400), &Rgb([90, 90, 90]));
    }

    #[test]
    fn test_load_face_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("portrait.png");
        RgbImage::from_pixel(400, 400, Rgb([120, 110, 100])).save(&source).unwrap();

        let mut app = app(dir.path());
        let update = app.handle(&Command::LoadFace(source), &mut face_analyzer()).unwrap();
        assert_eq!(update.status.unwrap().level, StatusLevel::Success);
        assert!(dir.path().join(LOADED_FACE_FILE).exists());
        assert!(app.engine().has_reference());
    }

    #[test]
    fn test_match_cycle_emits_each_transition_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        app.handle(&Command::SaveFace, &mut analyzer).unwrap();
        analyzer.locate_calls = 0;
        analyzer.seen_sizes.clear();

        // Same face in view: one transition, then silence.
        let statuses: Vec<Option<Status>> =
            (0..4).map(|_| app.tick(frame(640, 480), &mut analyzer).unwrap().status).collect();
        assert_eq!(statuses.iter().flatten().count(), 1);
        assert_eq!(app.engine().state(), LockState::Authorized);

        // Somebody else.
        analyzer.encodings = vec![encoding(&[0.0, 1.0, 0.0])];
        let statuses: Vec<Status> = (0..4)
            .filter_map(|_| app.tick(frame(640, 480), &mut analyzer).unwrap().status)
            .collect();
        assert_eq!(statuses, vec![Status::error("Unauthorized: Access Denied")]);

        // Every other tick, at quarter resolution.
        assert_eq!(analyzer.locate_calls, 4);
        assert!(analyzer.seen_sizes.iter().all(|&s| s == (160, 120)));
    }

    #[test]
    fn test_transition_renders_badge_and_state_colored_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let mut analyzer = face_analyzer();
        let mut app = app(dir.path());
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        app.handle(&Command::SaveFace, &mut analyzer).unwrap();

        // Tick parity: the save happened after tick 1, so tick 2 is skipped.
        app.tick(frame(640, 480), &mut analyzer).unwrap();
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        let badge = update.badge.unwrap();
        assert_eq!(badge.get_pixel(150, 20), &badge_color(LockState::Authorized));
        // Region (100,300,300,100) at quarter scale comes back ×4.
        let shown = update.frame.unwrap();
        assert_eq!(shown.get_pixel(400, 400), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_capture_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = app(dir.path()).handle(&Command::Capture, &mut face_analyzer()).unwrap_err();
        assert!(matches!(err, ActionError::Unsupported { command: "capture", app: "guard" }));
    }
}
