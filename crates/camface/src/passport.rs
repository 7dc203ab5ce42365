//! Passport photo capture: live face boxes plus a capture action that writes
//! one standard-size JPEG per detected face.

use crate::app::{ActionError, App, Command, Status, Update};
use crate::cadence::Cadence;
use crate::detection;
use crate::render;
use camface_core::{FaceAnalyzer, FaceRegion};
use camface_hw::Frame;
use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::Rgb;
use std::path::{Path, PathBuf};

/// Output size (width, height) of a passport photo.
pub const PASSPORT_SIZE: (u32, u32) = (350, 450);

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Expand a face region to passport framing, clamped to the frame.
///
/// Vertical margin is 120 % of the face height above and a third of that
/// below; horizontal margin is 50 % of the face width on each side. Returns
/// `None` when nothing of the expanded region lies inside the frame.
pub fn passport_crop(region: &FaceRegion, frame_width: u32, frame_height: u32) -> Option<CropRect> {
    let (w, h) = (frame_width as i64, frame_height as i64);
    let face_h = (region.height() as i64).max(0);
    let face_w = (region.width() as i64).max(0);

    let margin_y = face_h * 12 / 10;
    let margin_x = face_w / 2;

    let top = (region.top as i64 - margin_y).clamp(0, h);
    let bottom = (region.bottom as i64 + margin_y / 3).clamp(0, h);
    let left = (region.left as i64 - margin_x).clamp(0, w);
    let right = (region.right as i64 + margin_x).clamp(0, w);

    if bottom <= top || right <= left {
        return None;
    }
    Some(CropRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// `passport_<YYYYmmdd_HHMMSS>_<n>.jpg`, `n` starting at 1.
pub fn passport_file_name(now: &DateTime<Local>, n: usize) -> String {
    format!("passport_{}_{n}.jpg", now.format("%Y%m%d_%H%M%S"))
}

/// Write one passport photo per region of `frame` into `output_dir`.
///
/// Fails without touching the filesystem when there is no frame or no
/// region yields a usable crop.
pub fn capture_passport_photos(
    frame: Option<&Frame>,
    regions: &[FaceRegion],
    output_dir: &Path,
    now: &DateTime<Local>,
) -> Result<Vec<PathBuf>, ActionError> {
    let frame = frame.ok_or(ActionError::NoFrame)?;

    let rects: Vec<CropRect> = regions
        .iter()
        .filter_map(|region| {
            let rect = passport_crop(region, frame.width(), frame.height());
            if rect.is_none() {
                tracing::warn!(?region, "face region outside frame; skipped");
            }
            rect
        })
        .collect();
    if rects.is_empty() {
        return Err(ActionError::NoFaceDetected);
    }

    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(rects.len());
    for rect in rects {
        let face =
            imageops::crop_imm(&frame.image, rect.x, rect.y, rect.width, rect.height).to_image();
        let photo = imageops::resize(&face, PASSPORT_SIZE.0, PASSPORT_SIZE.1, FilterType::Triangle);

        let path = output_dir.join(passport_file_name(now, written.len() + 1));
        photo.save(&path)?;
        tracing::info!(path = %path.display(), ?rect, "passport photo written");
        written.push(path);
    }

    Ok(written)
}

/// App 1: passport photo capture.
pub struct PassportApp {
    cadence: Cadence,
    downscale: u32,
    output_dir: PathBuf,
    last_frame: Option<Frame>,
    regions: Vec<FaceRegion>,
}

impl PassportApp {
    pub fn new(cadence: Cadence, downscale: u32, output_dir: PathBuf) -> Self {
        tracing::debug!(
            interval = cadence.interval(),
            downscale,
            output_dir = %output_dir.display(),
            "passport app"
        );
        Self {
            cadence,
            downscale,
            output_dir,
            last_frame: None,
            regions: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn regions(&self) -> &[FaceRegion] {
        &self.regions
    }
}

impl App for PassportApp {
    fn name(&self) -> &'static str {
        "passport"
    }

    fn initial_update(&self) -> Update {
        Update::status(Status::info("Waiting for faces..."))
    }

    fn tick(
        &mut self,
        frame: Frame,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        self.last_frame = Some(frame.clone());

        if self.cadence.should_run() {
            match detection::locate_faces(analyzer, &frame.image, self.downscale) {
                Ok(regions) => self.regions = regions,
                Err(e) => {
                    self.regions.clear();
                    return Ok(Update::detection_failed(frame.image, &e));
                }
            }
        }

        let mut display = frame.image;
        for region in &self.regions {
            render::draw_region(&mut display, region, BOX_COLOR);
        }

        Ok(Update {
            frame: Some(display),
            status: Some(Status::info(format!("Detected Faces: {}", self.regions.len()))),
            ..Default::default()
        })
    }

    fn handle(
        &mut self,
        command: &Command,
        _analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError> {
        match command {
            Command::Capture => {
                let written =
                    capture_passport_photos(
                        self.last_frame.as_ref(),
                        &self.regions,
                        &self.output_dir,
                        &Local::now(),
                    )?;
                Ok(Update::status(Status::success(format!(
                    "Saved {} passport photo(s)!",
                    written.len()
                ))))
            }
            other => Err(ActionError::Unsupported {
                command: other.name(),
                app: self.name(),
            }),
        }
    }
}
