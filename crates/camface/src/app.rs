//! Types shared by the three apps and the capture loop.

use camface_core::{AnalyzerError, FaceAnalyzer};
use camface_hw::Frame;
use image::{RgbImage, RgbaImage};
use std::path::PathBuf;
use thiserror::Error;

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// Text shown in the status area of the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub level: StatusLevel,
}

impl Status {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: StatusLevel::Info }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: StatusLevel::Success }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), level: StatusLevel::Error }
    }
}

/// User-triggered action, read from the command stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture passport photos of every detected face.
    Capture,
    /// Save the face in the current frame as the reference.
    SaveFace,
    /// Load the reference face from an image file.
    LoadFace(PathBuf),
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        match word {
            "" => Ok(None),
            "c" | "capture" => Ok(Some(Command::Capture)),
            "s" | "save" => Ok(Some(Command::SaveFace)),
            "l" | "load" if rest.is_empty() => Err("load needs a file path".to_string()),
            "l" | "load" => Ok(Some(Command::LoadFace(PathBuf::from(rest)))),
            "q" | "quit" | "exit" => Ok(Some(Command::Quit)),
            other => Err(format!("unknown command: {other}")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Capture => "capture",
            Command::SaveFace => "save",
            Command::LoadFace(_) => "load",
            Command::Quit => "quit",
        }
    }
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("no frame captured yet")]
    NoFrame,
    #[error("no face detected in frame")]
    NoFaceDetected,
    #[error("no face found in the image file")]
    NoFaceInImage,
    #[error("no face encoding could be derived from the saved face")]
    NoEncoding,
    #[error("{command} is not available in {app}")]
    Unsupported { command: &'static str, app: &'static str },
    #[error("{0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

impl ActionError {
    /// Status line shown when an action fails.
    pub fn status(&self) -> Status {
        match self {
            ActionError::NoFrame => Status::error("No frame captured yet"),
            ActionError::NoFaceDetected => Status::error("No face detected in frame!"),
            ActionError::NoFaceInImage => Status::error("No face found in the image!"),
            ActionError::NoEncoding => Status::error("Could not compute face encoding"),
            ActionError::Unsupported { .. } => Status::error(self.to_string()),
            other => Status::error(format!("Error: {other}")),
        }
    }
}

/// What a tick or an action wants shown. `None` fields leave the surface as is.
#[derive(Debug, Default)]
pub struct Update {
    pub frame: Option<RgbImage>,
    pub status: Option<Status>,
    pub preview: Option<RgbImage>,
    pub badge: Option<RgbaImage>,
}

impl Update {
    pub fn status(status: Status) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    /// The undecorated frame plus the error, for a detection pass that failed.
    pub fn detection_failed(frame: RgbImage, error: &ActionError) -> Self {
        tracing::warn!(error = %error, "face detection failed");
        Self {
            frame: Some(frame),
            status: Some(error.status()),
            ..Default::default()
        }
    }
}

/// One of the camface tools, driven by the capture loop.
pub trait App {
    fn name(&self) -> &'static str;

    /// Shown before the first tick.
    fn initial_update(&self) -> Update;

    /// Process one successfully read frame.
    fn tick(
        &mut self,
        frame: Frame,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError>;

    /// Run a user action to completion.
    fn handle(
        &mut self,
        command: &Command,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Update, ActionError>;

    fn read_failure_status(&self) -> Status {
        Status::error("Cannot read from camera")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the app and loop tests.

    use super::*;
    use camface_core::detector::DetectorError;
    use camface_core::{FaceAnalyzer, FaceEncoding, FaceRegion, LandmarkSet};
    use image::Rgb;

    /// Returns canned results and counts calls.
    #[derive(Default)]
    pub struct FakeAnalyzer {
        pub regions: Vec<FaceRegion>,
        pub landmarks: Vec<LandmarkSet>,
        pub encodings: Vec<FaceEncoding>,
        pub locate_calls: usize,
        pub landmark_calls: usize,
        pub encode_calls: usize,
        pub seen_sizes: Vec<(u32, u32)>,
        /// Make every detection call fail.
        pub broken: bool,
    }

    impl FakeAnalyzer {
        fn check(&self) -> Result<(), AnalyzerError> {
            if self.broken {
                return Err(DetectorError::InferenceFailed("session crashed".into()).into());
            }
            Ok(())
        }
    }

    impl FaceAnalyzer for FakeAnalyzer {
        fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, AnalyzerError> {
            self.locate_calls += 1;
            self.seen_sizes.push(image.dimensions());
            self.check()?;
            Ok(self.regions.clone())
        }

        fn locate_landmarks(
            &mut self,
            _image: &RgbImage,
        ) -> Result<Vec<LandmarkSet>, AnalyzerError> {
            self.landmark_calls += 1;
            self.check()?;
            Ok(self.landmarks.clone())
        }

        fn encode_faces(
            &mut self,
            _image: &RgbImage,
            regions: &[FaceRegion],
        ) -> Result<Vec<FaceEncoding>, AnalyzerError> {
            self.encode_calls += 1;
            Ok(self.encodings.iter().take(regions.len()).cloned().collect())
        }
    }

    pub fn encoding(values: &[f32]) -> FaceEncoding {
        FaceEncoding { values: values.to_vec() }
    }

    pub fn frame(width: u32, height: u32) -> Frame {
        Frame::new(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])), 0)
    }
}
