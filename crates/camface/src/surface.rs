//! Display surfaces. The loop pushes frames, statuses, previews and badges;
//! how they are shown is up to the surface.

use crate::app::{Status, StatusLevel};
use camface_hw::ColorOrder;
use image::{ImageFormat, RgbImage, RgbaImage};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LIVE_FILE: &str = "live.jpg";
pub const PREVIEW_FILE: &str = "face_preview.png";
pub const BADGE_FILE: &str = "lock_badge.png";

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

pub trait Surface {
    /// Channel order `show_frame` expects.
    fn color_order(&self) -> ColorOrder {
        ColorOrder::Rgb
    }

    fn show_frame(&mut self, frame: &RgbImage) -> Result<(), SurfaceError>;

    fn set_status(&mut self, status: &Status) -> Result<(), SurfaceError>;

    fn show_preview(&mut self, preview: &RgbImage) -> Result<(), SurfaceError>;

    fn show_badge(&mut self, badge: &RgbaImage) -> Result<(), SurfaceError>;
}

/// Headless surface: images go to a directory, status lines to a writer.
pub struct FileSurface<W: Write = std::io::Stdout> {
    dir: PathBuf,
    every: u32,
    frames: u64,
    last_status: Option<Status>,
    out: W,
    color: bool,
}

impl FileSurface {
    /// Status lines go to stdout, coloured only when it is a terminal.
    pub fn new(dir: &Path, every: u32) -> Result<Self, SurfaceError> {
        let out = std::io::stdout();
        let color = use_color(&out);
        Self::with_writer(dir, every, out, color)
    }
}

fn use_color(stream: &impl IsTerminal) -> bool {
    stream.is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

impl<W: Write> FileSurface<W> {
    pub fn with_writer(dir: &Path, every: u32, out: W, color: bool) -> Result<Self, SurfaceError> {
        std::fs::create_dir_all(dir)?;
        tracing::info!(dir = %dir.display(), every, "writing preview images");
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            frames: 0,
            last_status: None,
            out,
            color,
        })
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    /// Write to a sibling temp file, then rename, so readers never see a
    /// half-written image.
    fn write_atomic<F>(&self, name: &str, write: F) -> Result<(), SurfaceError>
    where
        F: FnOnce(&Path) -> Result<(), image::ImageError>,
    {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        write(&tmp)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }
}

fn ansi(level: StatusLevel) -> &'static str {
    match level {
        StatusLevel::Info => "\x1b[0m",
        StatusLevel::Success => "\x1b[32m",
        StatusLevel::Error => "\x1b[31m",
    }
}

impl<W: Write> Surface for FileSurface<W> {
    fn show_frame(&mut self, frame: &RgbImage) -> Result<(), SurfaceError> {
        let due = self.frames % u64::from(self.every) == 0;
        self.frames += 1;
        if !due {
            return Ok(());
        }
        self.write_atomic(LIVE_FILE, |tmp| frame.save_with_format(tmp, ImageFormat::Jpeg))
    }

    fn set_status(&mut self, status: &Status) -> Result<(), SurfaceError> {
        if self.last_status.as_ref() == Some(status) {
            return Ok(());
        }
        if self.color {
            writeln!(self.out, "{}{}\x1b[0m", ansi(status.level), status.text)?;
        } else {
            writeln!(self.out, "{}", status.text)?;
        }
        self.out.flush()?;
        self.last_status = Some(status.clone());
        Ok(())
    }

    fn show_preview(&mut self, preview: &RgbImage) -> Result<(), SurfaceError> {
        self.write_atomic(PREVIEW_FILE, |tmp| preview.save_with_format(tmp, ImageFormat::Png))
    }

    fn show_badge(&mut self, badge: &RgbaImage) -> Result<(), SurfaceError> {
        self.write_atomic(BADGE_FILE, |tmp| badge.save_with_format(tmp, ImageFormat::Png))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Keeps everything it is shown.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub order: ColorOrder,
        pub frames: Vec<RgbImage>,
        pub statuses: Vec<Status>,
        pub previews: usize,
        pub badges: usize,
        pub fail_frames: bool,
    }

    impl Surface for RecordingSurface {
        fn color_order(&self) -> ColorOrder {
            self.order
        }

        fn show_frame(&mut self, frame: &RgbImage) -> Result<(), SurfaceError> {
            if self.fail_frames {
                return Err(SurfaceError::Io(std::io::Error::other("display gone")));
            }
            self.frames.push(frame.clone());
            Ok(())
        }

        fn set_status(&mut self, status: &Status) -> Result<(), SurfaceError> {
            self.statuses.push(status.clone());
            Ok(())
        }

        fn show_preview(&mut self, _preview: &RgbImage) -> Result<(), SurfaceError> {
            self.previews += 1;
            Ok(())
        }

        fn show_badge(&mut self, _badge: &RgbaImage) -> Result<(), SurfaceError> {
            self.badges += 1;
            Ok(())
        }
    }
}
