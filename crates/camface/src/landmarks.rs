//! Live facial structure viewer: named landmark polylines over the feed,
//! with detection throttled to every Nth tick on a downscaled frame.

use crate::app::{ActionError, App, Command, Status, Update};
use crate::cadence::Cadence;
use crate::detection;
use crate::render::{self, Painter};
use camface_core::{FaceAnalyzer, FaceRegion, LandmarkSet};
use camface_hw::Frame;
use image::Rgb;

const LINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([100, 200, 0]);

/// App 2: landmark viewer.
pub struct LandmarkApp {
    painter: Painter,
    cadence: Cadence,
    downscale: u32,
    regions: Vec<FaceRegion>,
    landmarks: Vec<LandmarkSet>,
}

impl LandmarkApp {
    pub fn new(painter: Painter, cadence: Cadence, downscale: u32) -> Self {
        tracing::debug!(interval = cadence.interval(), downscale, "landmark app");
        Self {
            painter,
            cadence,
            downscale,
            regions: Vec::new(),
            landmarks: Vec::new(),
        }
    }
}

impl App for LandmarkApp {
    fn name(&self) -> &'static str {
        "landmarks"
    }

    fn initial_update(&self) -> Update {
        Update::status(Status::info("Starting camera..."))
    }

    fn tick(
        &mut self,
        frame: Frame,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        if self.cadence.should_run() {
            match detection::locate_faces_and_landmarks(analyzer, &frame.image, self.downscale) {
                Ok((regions, landmarks)) => {
                    tracing::trace!(faces = regions.len(), "landmark pass");
                    self.regions = regions;
                    self.landmarks = landmarks;
                }
                Err(e) => {
                    self.regions.clear();
                    self.landmarks.clear();
                    return Ok(Update::detection_failed(frame.image, &e));
                }
            }
        }

        let mut display = frame.image;
        for set in &self.landmarks {
            self.painter.draw_landmarks(&mut display, set, LINE_COLOR, LABEL_COLOR);
        }
        for region in &self.regions {
            render::draw_region(&mut display, region, BOX_COLOR);
        }

        Ok(Update {
            frame: Some(display),
            status: Some(Status::info(format!("Faces Detected: {}", self.regions.len()))),
            ..Default::default()
        })
    }

    fn handle(
        &mut self,
        command: &Command,
        _analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        Err(ActionError::Unsupported {
            command: command.name(),
            app: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{frame, FakeAnalyzer};
    use crate::app::StatusLevel;
    use std::collections::BTreeMap;

    fn analyzer_with_face() -> FakeAnalyzer {
        let mut features = BTreeMap::new();
        features.insert("left_eye".to_string(), vec![(20, 20), (30, 20)]);
        FakeAnalyzer {
            regions: vec![FaceRegion::new(10, 60, 60, 10)],
            landmarks: vec![LandmarkSet { features }],
            ..Default::default()
        }
    }

    fn app() -> LandmarkApp {
        LandmarkApp::new(Painter::new(None), Cadence::new(5), 2)
    }

    #[test]
    fn test_detection_runs_every_fifth_tick() {
        let mut analyzer = analyzer_with_face();
        let mut app = app();
        for _ in 0..11 {
            app.tick(frame(640, 480), &mut analyzer).unwrap();
        }
        assert_eq!(analyzer.locate_calls, 3);
        assert_eq!(analyzer.landmark_calls, 3);
        assert!(analyzer.seen_sizes.iter().all(|&s| s == (320, 240)));
    }

    #[test]
    fn test_results_reused_between_detection_ticks() {
        let mut analyzer = analyzer_with_face();
        let mut app = app();
        app.tick(frame(640, 480), &mut analyzer).unwrap();

        // Faces vanish from the detector, but the next detection is 4 ticks away.
        analyzer.regions.clear();
        analyzer.landmarks.clear();
        for _ in 0..4 {
            let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
            assert_eq!(update.status, Some(Status::info("Faces Detected: 1")));
        }
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(update.status, Some(Status::info("Faces Detected: 0")));
    }

    #[test]
    fn test_overlays_drawn_at_full_scale() {
        let mut analyzer = analyzer_with_face();
        let mut app = app();
        let shown = app.tick(frame(640, 480), &mut analyzer).unwrap().frame.unwrap();
        // Left eye segment (20,20)-(30,20) scaled by 2.
        assert_eq!(shown.get_pixel(50, 40), &LINE_COLOR);
        // Box corner scaled by 2.
        assert_eq!(shown.get_pixel(20, 20), &BOX_COLOR);
    }

    #[test]
    fn test_failed_pass_shows_plain_frame_and_error() {
        let mut analyzer = analyzer_with_face();
        let mut app = app();
        app.tick(frame(640, 480), &mut analyzer).unwrap();

        analyzer.broken = true;
        for _ in 0..4 {
            app.tick(frame(640, 480), &mut analyzer).unwrap();
        }
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(update.status.unwrap().level, StatusLevel::Error);
        assert_eq!(update.frame.unwrap().get_pixel(20, 20), &Rgb([90, 90, 90]));

        // Results from before the failure are not drawn again.
        let update = app.tick(frame(640, 480), &mut analyzer).unwrap();
        assert_eq!(update.status, Some(Status::info("Faces Detected: 0")));
    }

    #[test]
    fn test_no_actions() {
        let mut app = app();
        assert!(app.handle(&Command::Capture, &mut FakeAnalyzer::default()).is_err());
    }
}
